//! Tabular query results and their text rendering

use serde::{Deserialize, Serialize};

/// Default maximum characters kept per rendered cell
pub const DEFAULT_MAX_CELL_CHARS: usize = 100;

/// A single decoded cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// Exact numeric kept in its textual form
    Numeric(String),
    Text(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Literal rendering used inside row tuples
    fn render_literal(&self, max_chars: usize) -> String {
        match self {
            Self::Null => "None".to_string(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Numeric(v) => v.clone(),
            Self::Text(v) => format!("'{}'", truncate(v, max_chars).replace('\'', "\\'")),
        }
    }

    /// Plain rendering used in tab-separated sample blocks
    fn render_plain(&self, max_chars: usize) -> String {
        match self {
            Self::Null => "None".to_string(),
            Self::Text(v) => truncate(v, max_chars),
            other => other.render_literal(max_chars),
        }
    }
}

/// Rows returned by a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Render as a list of row tuples, e.g. `[('Alice', 'CA'), ('Bob', None)]`.
    ///
    /// An empty result renders as an empty string.
    pub fn render(&self, max_cell_chars: usize) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        let tuples: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = row
                    .iter()
                    .map(|cell| cell.render_literal(max_cell_chars))
                    .collect();

                if cells.len() == 1 {
                    format!("({},)", cells[0])
                } else {
                    format!("({})", cells.join(", "))
                }
            })
            .collect();

        format!("[{}]", tuples.join(", "))
    }

    /// Render as a header line plus tab-separated rows
    pub fn render_tab_separated(&self, max_cell_chars: usize) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(self.columns.join("\t"));

        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| cell.render_plain(max_cell_chars))
                .collect();
            lines.push(cells.join("\t"));
        }

        lines.join("\n")
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    let truncated: String = value.chars().take(max_chars).collect();
    format!("{}...", truncated)
}
