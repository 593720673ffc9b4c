//! Read-only query policy checks.
//!
//! The database tool does not enforce read-only access; these checks only
//! let the workflow notice and log a generated statement that modifies data.

use once_cell::sync::Lazy;
use regex::Regex;

static DATA_MODIFICATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|TRUNCATE|MERGE|GRANT|REVOKE)\b")
        .unwrap()
});

/// Data-modification keywords found in `sql`, upper-cased, in order of appearance
pub fn data_modification_keywords(sql: &str) -> Vec<String> {
    DATA_MODIFICATION_PATTERN
        .find_iter(sql)
        .map(|m| m.as_str().to_uppercase())
        .collect()
}

pub fn contains_data_modification(sql: &str) -> bool {
    DATA_MODIFICATION_PATTERN.is_match(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_queries_pass() {
        assert!(!contains_data_modification(
            "SELECT name, state FROM customers WHERE state = 'CA' LIMIT 5"
        ));
        assert!(!contains_data_modification(
            "SELECT created_at, updated_at FROM orders ORDER BY updated_at DESC"
        ));
    }

    #[test]
    fn test_modifications_detected() {
        assert!(contains_data_modification("DELETE FROM orders"));
        assert!(contains_data_modification("drop table orders"));
        assert_eq!(
            data_modification_keywords("insert into a select 1; Update b set x = 1"),
            vec!["INSERT".to_string(), "UPDATE".to_string()]
        );
    }
}
