use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{Tool, ToolError};
use crate::domain::llm::{Message, ToolCall, ToolStatus};

/// Executes the tool calls of an assistant message.
///
/// Every call yields exactly one tool result, in call order. Tool failures
/// and unknown tool names become failed results instead of errors.
#[derive(Clone)]
pub struct ToolNode {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
    order: Vec<&'static str>,
}

impl ToolNode {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for tool in tools {
            let name = tool.name();
            if map.insert(name, tool).is_none() {
                order.push(name);
            }
        }
        Self { tools: map, order }
    }

    pub fn single(tool: Arc<dyn Tool>) -> Self {
        Self::new(vec![tool])
    }

    pub fn tool_names(&self) -> &[&'static str] {
        &self.order
    }

    pub async fn execute(&self, calls: &[ToolCall]) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute_one(call).await);
        }
        results
    }

    async fn execute_one(&self, call: &ToolCall) -> Message {
        let outcome = match self.tools.get(call.name.as_str()) {
            Some(tool) => tool.invoke(&call.arguments).await,
            None => Err(ToolError::unknown_tool(&call.name, &self.order)),
        };

        match outcome {
            Ok(content) => {
                debug!(tool = %call.name, call_id = %call.id, "Tool call succeeded");
                Message::tool(&call.id, content, ToolStatus::Success)
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool call failed");
                Message::tool(&call.id, e.to_string(), ToolStatus::Error)
            }
        }
    }
}

impl fmt::Debug for ToolNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolNode")
            .field("tools", &self.order)
            .finish()
    }
}
