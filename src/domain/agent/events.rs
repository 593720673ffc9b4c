use serde::Serialize;

use super::{TokenUsage, WorkflowNode};
use crate::domain::llm::Message;

/// Progress report for one completed workflow node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEvent {
    /// Node that just completed
    pub node: WorkflowNode,
    /// Messages the node appended, in order
    pub messages: Vec<Message>,
    /// Tokens consumed by the node's model call, zero for tool nodes
    pub usage: TokenUsage,
    /// Query attempt the node belongs to, zero before the first generation
    pub attempt: u32,
    pub duration_ms: u64,
}

impl StepEvent {
    /// Latest message appended by the step
    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }
}
