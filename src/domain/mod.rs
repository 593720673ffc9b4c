//! Domain layer - Core business logic and entities

pub mod agent;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod sql;
pub mod tools;

pub use error::DomainError;
pub use llm::{LlmProvider, LlmRequest, LlmResponse, Message, ToolCall};
pub use sql::SqlDatabase;
