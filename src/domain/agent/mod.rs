//! Query workflow definitions: nodes, edges, prompts and progress events

mod error;
mod events;
mod graph;
mod node;
pub mod policy;
pub mod prompts;
mod usage;

pub use error::AgentError;
pub use events::StepEvent;
pub use graph::WorkflowGraph;
pub use node::WorkflowNode;
pub use usage::{estimate_message_tokens, estimate_tokens, TokenUsage, BASE_TOKENS};
