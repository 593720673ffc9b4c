//! Query workflow orchestration

mod config;
mod run;
mod sql_agent;

pub use config::SqlAgentConfig;
pub use run::{TurnCompletion, TurnOutcome, WorkflowRun};
pub use sql_agent::SqlAgent;
