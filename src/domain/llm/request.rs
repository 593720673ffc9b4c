use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Message;

/// A function the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// How the model is allowed to use the bound tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    /// The model must call at least one tool
    Required,
    /// The model must call this specific tool
    Function(String),
}

/// Parameters for LLM generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            tool_choice: None,
            parallel_tool_calls: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn builder() -> LlmRequestBuilder {
        LlmRequestBuilder::new()
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// Builder for LlmRequest
#[derive(Debug, Default)]
pub struct LlmRequestBuilder {
    messages: Vec<Message>,
    tools: Vec<ToolDefinition>,
    tool_choice: Option<ToolChoice>,
    parallel_tool_calls: Option<bool>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LlmRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn system(self, content: impl Into<String>) -> Self {
        self.message(Message::system(content))
    }

    pub fn user(self, content: impl Into<String>) -> Self {
        self.message(Message::user(content))
    }

    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = Some(enabled);
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn build(self) -> LlmRequest {
        LlmRequest {
            messages: self.messages,
            tools: self.tools,
            tool_choice: self.tool_choice,
            parallel_tool_calls: self.parallel_tool_calls,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::builder()
            .system("You are a SQL expert")
            .user("How many orders?")
            .temperature(0.0)
            .max_tokens(100)
            .build();

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(100));
        assert!(!request.has_tools());
        assert!(request.tool_choice.is_none());
    }

    #[test]
    fn test_request_with_tools() {
        let tool = ToolDefinition::new(
            "db_query_tool",
            "Execute a query",
            json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        );

        let request = LlmRequest::builder()
            .user("SELECT 1")
            .tool(tool)
            .tool_choice(ToolChoice::Required)
            .parallel_tool_calls(false)
            .build();

        assert!(request.has_tools());
        assert_eq!(request.tool_choice, Some(ToolChoice::Required));
        assert_eq!(request.parallel_tool_calls, Some(false));
    }
}
