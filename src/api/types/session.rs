//! Request and event payloads of the chat session endpoints

use serde::{Deserialize, Serialize};

use crate::domain::agent::{AgentError, StepEvent, TokenUsage, WorkflowNode};
use crate::domain::llm::{Message, ToolStatus};
use crate::infrastructure::agent::TurnOutcome;

#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCreated {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageView {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<TokenUsage> for UsageView {
    fn from(usage: TokenUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens(),
        }
    }
}

/// Who a transcript message is shown as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    System,
    Human,
    Agent,
    Tool,
}

impl Speaker {
    pub fn of(message: &Message) -> Self {
        match message {
            Message::System { .. } => Self::System,
            Message::User { .. } => Self::Human,
            Message::Assistant { .. } => Self::Agent,
            Message::Tool { .. } => Self::Tool,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::Human => "Human",
            Self::Agent => "Agent",
            Self::Tool => "Tool",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolUseView {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A transcript message rendered for display
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub speaker: Speaker,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolUseView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<bool>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        let (tool_call_id, failed) = match message {
            Message::Tool {
                tool_call_id,
                status,
                ..
            } => (Some(tool_call_id.clone()), Some(*status == ToolStatus::Error)),
            _ => (None, None),
        };

        Self {
            speaker: Speaker::of(message),
            content: message.content_text().map(str::to_string),
            tool_calls: message
                .tool_calls()
                .iter()
                .map(|call| ToolUseView {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                })
                .collect(),
            tool_call_id,
            failed,
        }
    }
}

/// Payload of a `step` event
#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub node: WorkflowNode,
    pub attempt: u32,
    pub duration_ms: u64,
    pub usage: UsageView,
    pub messages: Vec<MessageView>,
}

impl From<&StepEvent> for StepView {
    fn from(event: &StepEvent) -> Self {
        Self {
            node: event.node,
            attempt: event.attempt,
            duration_ms: event.duration_ms,
            usage: event.usage.into(),
            messages: event.messages.iter().map(MessageView::from).collect(),
        }
    }
}

/// Payload of the terminal `answer` event
#[derive(Debug, Clone, Serialize)]
pub struct AnswerView {
    pub session_id: String,
    pub answer: String,
    pub completion: &'static str,
    pub attempts: u32,
    pub usage: UsageView,
}

impl AnswerView {
    pub fn new(session_id: impl Into<String>, outcome: &TurnOutcome) -> Self {
        Self {
            session_id: session_id.into(),
            answer: outcome.answer.clone(),
            completion: outcome.completion.as_str(),
            attempts: outcome.attempts,
            usage: outcome.usage.into(),
        }
    }
}

/// Payload of the terminal `error` event
#[derive(Debug, Clone, Serialize)]
pub struct ErrorView {
    pub kind: &'static str,
    pub message: String,
}

impl From<&AgentError> for ErrorView {
    fn from(err: &AgentError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::ToolCall;
    use serde_json::json;

    #[test]
    fn test_usage_view_includes_total() {
        let view = UsageView::from(TokenUsage::new(12, 30));
        assert_eq!(view.total_tokens, 42);
    }

    #[test]
    fn test_speakers() {
        assert_eq!(Speaker::of(&Message::user("q")), Speaker::Human);
        assert_eq!(Speaker::of(&Message::assistant("a")), Speaker::Agent);
        assert_eq!(Speaker::Tool.label(), "Tool");
    }

    #[test]
    fn test_tool_call_message_view() {
        let message = Message::assistant_with_tool_calls(
            None,
            vec![ToolCall::new("call_1", "db_query_tool", json!({"query": "SELECT 1"}))],
        );

        let json = serde_json::to_value(MessageView::from(&message)).unwrap();

        assert_eq!(json["speaker"], "agent");
        assert!(json.get("content").is_none());
        assert_eq!(json["tool_calls"][0]["name"], "db_query_tool");
    }

    #[test]
    fn test_failed_tool_result_view() {
        let message = Message::tool("call_1", "Error: no such table", ToolStatus::Error);
        let view = MessageView::from(&message);

        assert_eq!(view.speaker, Speaker::Tool);
        assert_eq!(view.failed, Some(true));
        assert_eq!(view.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_error_view() {
        let view = ErrorView::from(&AgentError::StepBudget { max_steps: 3 });
        assert_eq!(view.kind, "step_budget");
        assert!(view.message.contains('3'));
    }
}
