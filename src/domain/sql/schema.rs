//! Table schema descriptors rendered as plain text for the model

use serde::{Deserialize, Serialize};

use super::QueryRows;

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        }
    }
}

/// A table with its columns and optional sample rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<QueryRows>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
            sample: None,
        }
    }

    pub fn with_sample(mut self, sample: QueryRows) -> Self {
        self.sample = Some(sample);
        self
    }

    /// Render DDL followed by a commented sample block
    pub fn render(&self, max_cell_chars: usize) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut line = format!("\t{} {}", c.name, c.data_type.to_uppercase());
                if !c.nullable {
                    line.push_str(" NOT NULL");
                }
                line
            })
            .collect();

        let mut out = format!("CREATE TABLE {} (\n{}\n)", self.name, columns.join(",\n"));

        if let Some(sample) = &self.sample {
            out.push_str(&format!(
                "\n\n/*\n{} rows from {} table:\n{}\n*/",
                sample.len(),
                self.name,
                sample.render_tab_separated(max_cell_chars)
            ));
        }

        out
    }
}

/// Render several tables separated by blank lines
pub fn render_schemas(tables: &[TableSchema], max_cell_chars: usize) -> String {
    tables
        .iter()
        .map(|t| t.render(max_cell_chars))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split a comma separated table list, dropping blanks
pub fn parse_table_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
