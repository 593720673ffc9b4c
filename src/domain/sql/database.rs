//! Database collaborator trait

use async_trait::async_trait;

use super::QueryRows;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Read access to the relational database the agent queries.
///
/// Implementations own the connection lifecycle; the workflow only sees
/// these operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SqlDatabase: Send + Sync {
    /// SQL dialect name used in prompts (e.g. "PostgreSQL")
    fn dialect(&self) -> &'static str;

    /// Names of all tables visible to the configured credentials
    async fn list_tables(&self) -> Result<Vec<String>, DomainError>;

    /// DDL and sample rows for the named tables.
    ///
    /// Fails with `NotFound` when any name does not exist.
    async fn table_info(&self, tables: &[String]) -> Result<String, DomainError>;

    /// Execute a query and return its rows
    async fn run(&self, query: &str) -> Result<QueryRows, DomainError>;

    /// Cheap connectivity check
    async fn ping(&self) -> Result<(), DomainError>;
}
