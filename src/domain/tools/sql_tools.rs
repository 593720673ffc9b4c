//! The three database tools used by the agent workflow

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolError, ToolOutcome};
use crate::domain::llm::ToolDefinition;
use crate::domain::sql::{parse_table_names, SqlDatabase};

pub const LIST_TABLES_TOOL: &str = "sql_db_list_tables";
pub const SCHEMA_TOOL: &str = "sql_db_schema";
pub const QUERY_TOOL: &str = "db_query_tool";

/// Lists the tables visible to the agent
pub struct ListTablesTool {
    db: Arc<dyn SqlDatabase>,
}

impl ListTablesTool {
    pub fn new(db: Arc<dyn SqlDatabase>) -> Self {
        Self { db }
    }
}

impl fmt::Debug for ListTablesTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListTablesTool").finish()
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &'static str {
        LIST_TABLES_TOOL
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            LIST_TABLES_TOOL,
            "Input is an empty string, output is a comma-separated list of tables in the database.",
            json!({"type": "object", "properties": {}}),
        )
    }

    async fn invoke(&self, _arguments: &Value) -> ToolOutcome {
        let tables = self
            .db
            .list_tables()
            .await
            .map_err(|e| ToolError::execution(e.to_string()))?;

        Ok(tables.join(", "))
    }
}

/// Returns DDL and sample rows for a set of tables
pub struct SchemaTool {
    db: Arc<dyn SqlDatabase>,
}

impl SchemaTool {
    pub fn new(db: Arc<dyn SqlDatabase>) -> Self {
        Self { db }
    }
}

impl fmt::Debug for SchemaTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaTool").finish()
    }
}

#[async_trait]
impl Tool for SchemaTool {
    fn name(&self) -> &'static str {
        SCHEMA_TOOL
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            SCHEMA_TOOL,
            "Input to this tool is a comma-separated list of tables, output is the schema and \
             sample rows for those tables. Be sure that the tables actually exist by calling \
             sql_db_list_tables first! Example Input: table1, table2, table3",
            json!({
                "type": "object",
                "properties": {
                    "table_names": {
                        "type": "string",
                        "description": "A comma-separated list of the table names for which to return the schema."
                    }
                },
                "required": ["table_names"]
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> ToolOutcome {
        let tables = match arguments.get("table_names") {
            Some(Value::String(raw)) => parse_table_names(raw),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .flat_map(parse_table_names)
                .collect(),
            _ => {
                return Err(ToolError::invalid_arguments(
                    SCHEMA_TOOL,
                    "'table_names' must be a comma-separated string",
                ))
            }
        };

        if tables.is_empty() {
            return Err(ToolError::invalid_arguments(
                SCHEMA_TOOL,
                "'table_names' is empty",
            ));
        }

        self.db
            .table_info(&tables)
            .await
            .map_err(|e| ToolError::execution(e.to_string()))
    }
}

/// Executes a query and returns the rendered rows
pub struct QueryTool {
    db: Arc<dyn SqlDatabase>,
    max_cell_chars: usize,
}

impl QueryTool {
    pub fn new(db: Arc<dyn SqlDatabase>, max_cell_chars: usize) -> Self {
        Self { db, max_cell_chars }
    }
}

impl fmt::Debug for QueryTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTool")
            .field("max_cell_chars", &self.max_cell_chars)
            .finish()
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &'static str {
        QUERY_TOOL
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            QUERY_TOOL,
            format!(
                "Execute a {} query against the database and get back the result. \
                 If the query is not correct, an error message will be returned. \
                 If an error is returned, rewrite the query, check the query, and try again.",
                self.db.dialect()
            ),
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The SQL query to execute."}
                },
                "required": ["query"]
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> ToolOutcome {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::invalid_arguments(QUERY_TOOL, "missing 'query'"))?;

        let rows = self
            .db
            .run(query)
            .await
            .map_err(|e| ToolError::execution(e.to_string()))?;

        let rendered = rows.render(self.max_cell_chars);
        if rendered.is_empty() {
            return Err(ToolError::QueryFailed);
        }

        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sql::{CellValue, MockSqlDatabase, QueryRows, DEFAULT_MAX_CELL_CHARS};
    use crate::domain::DomainError;

    fn query_tool(db: MockSqlDatabase) -> QueryTool {
        QueryTool::new(Arc::new(db), DEFAULT_MAX_CELL_CHARS)
    }

    #[tokio::test]
    async fn test_list_tables_joins_names() {
        let mut db = MockSqlDatabase::new();
        db.expect_list_tables()
            .returning(|| Ok(vec!["customers".to_string(), "orders".to_string()]));

        let tool = ListTablesTool::new(Arc::new(db));
        let result = tool.invoke(&json!({})).await;

        assert_eq!(result, Ok("customers, orders".to_string()));
    }

    #[tokio::test]
    async fn test_schema_tool_passes_parsed_names() {
        let mut db = MockSqlDatabase::new();
        db.expect_table_info()
            .withf(|tables: &[String]| tables == ["customers".to_string(), "orders".to_string()])
            .returning(|_| Ok("CREATE TABLE customers (...)".to_string()));

        let tool = SchemaTool::new(Arc::new(db));
        let result = tool
            .invoke(&json!({"table_names": "customers, orders"}))
            .await;

        assert_eq!(result, Ok("CREATE TABLE customers (...)".to_string()));
    }

    #[tokio::test]
    async fn test_schema_tool_unknown_table_is_error_text() {
        let mut db = MockSqlDatabase::new();
        db.expect_table_info().returning(|_| {
            Err(DomainError::not_found(
                "table_names {'ordrs'} not found in database",
            ))
        });

        let tool = SchemaTool::new(Arc::new(db));
        let err = tool
            .invoke(&json!({"table_names": "ordrs"}))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Error:"));
        assert!(err.to_string().contains("ordrs"));
    }

    #[tokio::test]
    async fn test_schema_tool_rejects_missing_argument() {
        let tool = SchemaTool::new(Arc::new(MockSqlDatabase::new()));
        let err = tool.invoke(&json!({})).await.unwrap_err();

        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_query_tool_renders_rows() {
        let mut db = MockSqlDatabase::new();
        db.expect_run()
            .withf(|q: &str| q == "SELECT name FROM customers LIMIT 5")
            .returning(|_| {
                Ok(QueryRows::new(
                    vec!["name".to_string()],
                    vec![vec![CellValue::text("Alice")]],
                ))
            });

        let result = query_tool(db)
            .invoke(&json!({"query": "  SELECT name FROM customers LIMIT 5 "}))
            .await;

        assert_eq!(result, Ok("[('Alice',)]".to_string()));
    }

    #[tokio::test]
    async fn test_query_tool_empty_result_is_query_failed() {
        let mut db = MockSqlDatabase::new();
        db.expect_run().returning(|_| Ok(QueryRows::empty()));

        let err = query_tool(db)
            .invoke(&json!({"query": "SELECT 1 WHERE false"}))
            .await
            .unwrap_err();

        assert_eq!(err, ToolError::QueryFailed);
    }

    #[tokio::test]
    async fn test_query_tool_database_error_is_returned() {
        let mut db = MockSqlDatabase::new();
        db.expect_run()
            .returning(|_| Err(DomainError::database("column \"nme\" does not exist")));

        let err = query_tool(db)
            .invoke(&json!({"query": "SELECT nme FROM customers"}))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Error: Database error: column \"nme\" does not exist"
        );
    }

    #[tokio::test]
    async fn test_query_tool_missing_query() {
        let err = query_tool(MockSqlDatabase::new())
            .invoke(&json!("not an object"))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_query_tool_definition_mentions_dialect() {
        let mut db = MockSqlDatabase::new();
        db.expect_dialect().return_const("PostgreSQL");

        let definition = query_tool(db).definition();

        assert_eq!(definition.name, QUERY_TOOL);
        assert!(definition.description.contains("PostgreSQL"));
        assert_eq!(definition.parameters["required"], json!(["query"]));
    }
}
