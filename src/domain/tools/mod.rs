//! Tools the agent can call and the node that executes them

mod error;
mod node;
mod sql_tools;
mod tool;

pub use error::{ToolError, ToolOutcome, FAILURE_MARKER};
pub use node::ToolNode;
pub use sql_tools::{
    ListTablesTool, QueryTool, SchemaTool, LIST_TABLES_TOOL, QUERY_TOOL, SCHEMA_TOOL,
};
pub use tool::Tool;
