use std::fmt;

use serde::{Deserialize, Serialize};

/// A state of the query workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowNode {
    Seed,
    ListTables,
    SelectSchema,
    FetchSchema,
    GenerateQuery,
    ValidateQuery,
    ExecuteQuery,
    FormatResponse,
    Done,
}

impl WorkflowNode {
    pub const ALL: [WorkflowNode; 9] = [
        Self::Seed,
        Self::ListTables,
        Self::SelectSchema,
        Self::FetchSchema,
        Self::GenerateQuery,
        Self::ValidateQuery,
        Self::ExecuteQuery,
        Self::FormatResponse,
        Self::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::ListTables => "list_tables",
            Self::SelectSchema => "select_schema",
            Self::FetchSchema => "fetch_schema",
            Self::GenerateQuery => "generate_query",
            Self::ValidateQuery => "validate_query",
            Self::ExecuteQuery => "execute_query",
            Self::FormatResponse => "format_response",
            Self::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Whether the node calls the language model
    pub fn calls_model(&self) -> bool {
        matches!(
            self,
            Self::SelectSchema | Self::GenerateQuery | Self::ValidateQuery | Self::FormatResponse
        )
    }

    /// Whether the node executes tool calls
    pub fn runs_tools(&self) -> bool {
        matches!(self, Self::ListTables | Self::FetchSchema | Self::ExecuteQuery)
    }
}

impl fmt::Display for WorkflowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
