//! PostgreSQL database collaborator with connection pooling

use std::collections::HashSet;
use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::BigDecimal;
use sqlx::{Column, Postgres, Row, TypeInfo};
use tracing::debug;
use uuid::Uuid;

use crate::domain::sql::{
    render_schemas, CellValue, ColumnInfo, QueryRows, SqlDatabase, TableSchema,
    DEFAULT_MAX_CELL_CHARS,
};
use crate::domain::DomainError;

/// PostgreSQL connection configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Schema whose tables are exposed to the agent
    pub schema: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
    /// Sample rows included with each table schema
    pub sample_rows: u32,
    /// Cell truncation for rendered samples
    pub max_cell_chars: usize,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/postgres".to_string(),
            schema: "public".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            sample_rows: 3,
            max_cell_chars: DEFAULT_MAX_CELL_CHARS,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    pub fn with_sample_rows(mut self, rows: u32) -> Self {
        self.sample_rows = rows;
        self
    }

    pub fn with_max_cell_chars(mut self, chars: usize) -> Self {
        self.max_cell_chars = chars;
        self
    }
}

/// [`SqlDatabase`] backed by a sqlx PostgreSQL pool
pub struct PostgresDatabase {
    pool: PgPool,
    config: PostgresConfig,
}

impl Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("schema", &self.config.schema)
            .field("sample_rows", &self.config.sample_rows)
            .finish()
    }
}

impl PostgresDatabase {
    pub fn new(pool: PgPool, config: PostgresConfig) -> Self {
        Self { pool, config }
    }

    /// Open a connection pool
    pub async fn connect(config: PostgresConfig) -> Result<Self, DomainError> {
        let pool = Self::pool_options(&config)
            .connect(&config.url)
            .await
            .map_err(|e| {
                DomainError::database(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        Ok(Self::new(pool, config))
    }

    /// Build a pool that connects on first use
    pub fn connect_lazy(config: PostgresConfig) -> Result<Self, DomainError> {
        let pool = Self::pool_options(&config)
            .connect_lazy(&config.url)
            .map_err(|e| DomainError::configuration(format!("Invalid database URL: {}", e)))?;

        Ok(Self::new(pool, config))
    }

    fn pool_options(config: &PostgresConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT column_name, data_type, is_nullable
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(&self.config.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to read columns of {}: {}", table, e)))?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get(0).map_err(db_error)?;
                let data_type: String = row.try_get(1).map_err(db_error)?;
                let nullable: String = row.try_get(2).map_err(db_error)?;
                Ok(ColumnInfo::new(name, data_type, nullable == "YES"))
            })
            .collect()
    }

    async fn sample(&self, table: &str) -> Result<QueryRows, DomainError> {
        let query = format!(
            "SELECT * FROM {}.{} LIMIT {}",
            quote_ident(&self.config.schema),
            quote_ident(table),
            self.config.sample_rows
        );

        self.run(&query).await
    }
}

#[async_trait]
impl SqlDatabase for PostgresDatabase {
    fn dialect(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn list_tables(&self) -> Result<Vec<String>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .bind(&self.config.schema)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list tables: {}", e)))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(db_error))
            .collect()
    }

    async fn table_info(&self, tables: &[String]) -> Result<String, DomainError> {
        let known = self.list_tables().await?;
        let missing = missing_tables(tables, &known);
        if !missing.is_empty() {
            return Err(DomainError::not_found(format!(
                "table_names {{{}}} not found in database",
                missing.join(", ")
            )));
        }

        let mut schemas = Vec::with_capacity(tables.len());
        for table in tables {
            let mut schema = TableSchema::new(table.as_str(), self.columns(table).await?);
            if self.config.sample_rows > 0 {
                schema = schema.with_sample(self.sample(table).await?);
            }
            schemas.push(schema);
        }

        Ok(render_schemas(&schemas, self.config.max_cell_chars))
    }

    async fn run(&self, query: &str) -> Result<QueryRows, DomainError> {
        debug!(query = %query, "Executing query");

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database(e.to_string()))?;

        let Some(first) = rows.first() else {
            return Ok(QueryRows::empty());
        };

        let columns = first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let decoded = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| decode_cell(row, i)).collect())
            .collect();

        Ok(QueryRows::new(columns, decoded))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| DomainError::database(format!("Ping failed: {}", e)))
    }
}

fn db_error(e: sqlx::Error) -> DomainError {
    DomainError::database(e.to_string())
}

/// Requested names absent from the known tables, in request order
fn missing_tables(requested: &[String], known: &[String]) -> Vec<String> {
    let known: HashSet<&str> = known.iter().map(String::as_str).collect();
    requested
        .iter()
        .filter(|name| !known.contains(name.as_str()))
        .cloned()
        .collect()
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn decode_cell(row: &PgRow, index: usize) -> CellValue {
    let type_name = row.columns()[index].type_info().name();

    let decoded = match type_name {
        "BOOL" => cell(row, index, CellValue::Bool),
        "INT2" => cell(row, index, |v: i16| CellValue::Integer(v.into())),
        "INT4" => cell(row, index, |v: i32| CellValue::Integer(v.into())),
        "INT8" => cell(row, index, CellValue::Integer),
        "FLOAT4" => cell(row, index, |v: f32| CellValue::Float(v.into())),
        "FLOAT8" => cell(row, index, CellValue::Float),
        "NUMERIC" => cell(row, index, |v: BigDecimal| CellValue::Numeric(v.to_string())),
        "DATE" => cell(row, index, |v: NaiveDate| CellValue::Text(v.to_string())),
        "TIME" => cell(row, index, |v: NaiveTime| CellValue::Text(v.to_string())),
        "TIMESTAMP" => cell(row, index, |v: NaiveDateTime| CellValue::Text(v.to_string())),
        "TIMESTAMPTZ" => cell(row, index, |v: DateTime<Utc>| CellValue::Text(v.to_rfc3339())),
        "UUID" => cell(row, index, |v: Uuid| CellValue::Text(v.to_string())),
        "JSON" | "JSONB" => cell(row, index, |v: serde_json::Value| CellValue::Text(v.to_string())),
        _ => cell(row, index, CellValue::Text),
    };

    decoded.unwrap_or_else(|| CellValue::Text(format!("<{}>", type_name.to_lowercase())))
}

/// Decode one column as `T`; `None` when the value cannot be read as `T`
fn cell<'r, T, F>(row: &'r PgRow, index: usize, wrap: F) -> Option<CellValue>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    F: FnOnce(T) -> CellValue,
{
    match row.try_get::<Option<T>, _>(index) {
        Ok(Some(value)) => Some(wrap(value)),
        Ok(None) => Some(CellValue::Null),
        Err(_) => None,
    }
}
