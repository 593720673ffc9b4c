//! Tool failures and the failure marker

use thiserror::Error;

/// Leading text of every failed tool result
pub const FAILURE_MARKER: &str = "Error:";

/// Result type returned by every tool
pub type ToolOutcome = Result<String, ToolError>;

/// Failure raised inside a tool.
///
/// Never propagated out of a tool node; its display text becomes the content
/// of the tool result and always begins with [`FAILURE_MARKER`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Error: {name} is not a valid tool, try one of [{available}].\n please fix your mistakes.")]
    UnknownTool { name: String, available: String },

    #[error("Error: invalid arguments for {tool}: {message}\n please fix your mistakes.")]
    InvalidArguments { tool: String, message: String },

    #[error("Error: {0}")]
    Execution(String),

    #[error("Error: Query failed. Please rewrite your query and try again.")]
    QueryFailed,
}

impl ToolError {
    pub fn unknown_tool(name: impl Into<String>, available: &[&str]) -> Self {
        Self::UnknownTool {
            name: name.into(),
            available: available.join(", "),
        }
    }

    pub fn invalid_arguments(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}
