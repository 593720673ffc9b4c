//! Infrastructure layer - External service implementations

pub mod agent;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod session_store;
pub mod sql;
