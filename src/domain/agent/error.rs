use thiserror::Error;

use super::WorkflowNode;
use crate::domain::conversation::ConversationError;
use crate::domain::DomainError;

/// Failure that ends a turn
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Language model call failed during {node}: {source}")]
    Llm {
        node: WorkflowNode,
        #[source]
        source: DomainError,
    },

    #[error("Expected a {tool} call from the model during {node}")]
    MissingToolCall {
        node: WorkflowNode,
        tool: &'static str,
    },

    #[error("Workflow exceeded {max_steps} steps")]
    StepBudget { max_steps: usize },

    #[error("Transcript rejected: {0}")]
    Transcript(#[from] ConversationError),

    #[error("Workflow run already failed and cannot continue")]
    RunAborted,

    #[error("Session {session_id} already has a turn in flight")]
    SessionBusy { session_id: String },
}

impl AgentError {
    pub fn llm(node: WorkflowNode, source: DomainError) -> Self {
        Self::Llm { node, source }
    }

    pub fn missing_tool_call(node: WorkflowNode, tool: &'static str) -> Self {
        Self::MissingToolCall { node, tool }
    }

    pub fn session_busy(session_id: impl Into<String>) -> Self {
        Self::SessionBusy {
            session_id: session_id.into(),
        }
    }

    /// Short label used in metrics and error events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Llm { .. } => "llm",
            Self::MissingToolCall { .. } => "missing_tool_call",
            Self::StepBudget { .. } => "step_budget",
            Self::Transcript(_) => "transcript",
            Self::RunAborted => "run_aborted",
            Self::SessionBusy { .. } => "session_busy",
        }
    }
}
