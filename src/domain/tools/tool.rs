use async_trait::async_trait;
use serde_json::Value;

use super::ToolOutcome;
use crate::domain::llm::ToolDefinition;

/// An operation the model can invoke by name
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Definition advertised to the model
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Failures are returned, never raised.
    async fn invoke(&self, arguments: &Value) -> ToolOutcome;
}
