//! Relational database domain: the collaborator trait, schema descriptors
//! and result rendering

mod database;
mod rows;
mod schema;

pub use database::SqlDatabase;
pub use rows::{CellValue, QueryRows, DEFAULT_MAX_CELL_CHARS};
pub use schema::{parse_table_names, render_schemas, ColumnInfo, TableSchema};

#[cfg(test)]
pub use database::MockSqlDatabase;
