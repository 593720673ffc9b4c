//! Append-only conversation transcript

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use crate::domain::llm::Message;

/// Violation of the transcript's linking rules
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("tool result at position {position} has no preceding assistant message")]
    OrphanToolResult { position: usize },

    #[error("tool result at position {position} answers unknown call '{tool_call_id}'")]
    UnknownToolCall {
        position: usize,
        tool_call_id: String,
    },

    #[error("tool call '{tool_call_id}' answered more than once")]
    DuplicateToolResult { tool_call_id: String },
}

/// The ordered message list a turn works on.
///
/// Messages can only be appended; there is no way to remove, reorder or
/// edit an existing message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_question(question: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(question)],
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, delta: impl IntoIterator<Item = Message>) {
        self.messages.extend(delta);
    }

    /// Append tool results for the calls of the last message.
    ///
    /// Rejects the whole batch when the last message is not an assistant
    /// message or a result answers a call it did not issue.
    pub fn append_tool_results(&mut self, results: Vec<Message>) -> Result<(), ConversationError> {
        let position = self.messages.len();
        let issued: HashSet<&str> = match self.messages.last() {
            Some(Message::Assistant { tool_calls, .. }) => {
                tool_calls.iter().map(|c| c.id.as_str()).collect()
            }
            _ => return Err(ConversationError::OrphanToolResult { position }),
        };

        let mut answered = HashSet::new();
        for (offset, result) in results.iter().enumerate() {
            let Message::Tool { tool_call_id, .. } = result else {
                continue;
            };
            if !issued.contains(tool_call_id.as_str()) {
                return Err(ConversationError::UnknownToolCall {
                    position: position + offset,
                    tool_call_id: tool_call_id.clone(),
                });
            }
            if !answered.insert(tool_call_id.as_str()) {
                return Err(ConversationError::DuplicateToolResult {
                    tool_call_id: tool_call_id.clone(),
                });
            }
        }

        self.messages.extend(results);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Check that every tool result answers exactly one call of the nearest
    /// preceding assistant message, and that no call is answered twice.
    pub fn validate_tool_links(&self) -> Result<(), ConversationError> {
        let mut issued: Option<HashSet<&str>> = None;
        let mut answered: HashSet<&str> = HashSet::new();

        for (position, message) in self.messages.iter().enumerate() {
            match message {
                Message::Assistant { tool_calls, .. } => {
                    issued = Some(tool_calls.iter().map(|c| c.id.as_str()).collect());
                }
                Message::Tool { tool_call_id, .. } => {
                    let calls = issued
                        .as_ref()
                        .ok_or(ConversationError::OrphanToolResult { position })?;
                    if !calls.contains(tool_call_id.as_str()) {
                        return Err(ConversationError::UnknownToolCall {
                            position,
                            tool_call_id: tool_call_id.clone(),
                        });
                    }
                    if !answered.insert(tool_call_id.as_str()) {
                        return Err(ConversationError::DuplicateToolResult {
                            tool_call_id: tool_call_id.clone(),
                        });
                    }
                }
                Message::System { .. } | Message::User { .. } => {}
            }
        }

        Ok(())
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{ToolCall, ToolStatus};
    use serde_json::json;

    fn seeded() -> ConversationState {
        let mut state = ConversationState::with_question("How many orders?");
        state.append(Message::assistant_with_tool_calls(
            None,
            vec![ToolCall::new("call_1", "sql_db_list_tables", json!({}))],
        ));
        state
    }

    #[test]
    fn test_with_question() {
        let state = ConversationState::with_question("hello");
        assert_eq!(state.len(), 1);
        assert_eq!(state.last(), Some(&Message::user("hello")));
    }

    #[test]
    fn test_append_preserves_prefix() {
        let mut state = seeded();
        let before = state.messages().to_vec();

        state.extend(vec![Message::assistant("a"), Message::assistant("b")]);

        assert_eq!(state.len(), before.len() + 2);
        assert_eq!(&state.messages()[..before.len()], before.as_slice());
    }

    #[test]
    fn test_append_tool_results_accepts_matching_ids() {
        let mut state = seeded();
        let result = state.append_tool_results(vec![Message::tool(
            "call_1",
            "customers, orders",
            ToolStatus::Success,
        )]);

        assert!(result.is_ok());
        assert_eq!(state.len(), 3);
        assert!(state.validate_tool_links().is_ok());
    }

    #[test]
    fn test_append_tool_results_rejects_unknown_id() {
        let mut state = seeded();
        let err = state
            .append_tool_results(vec![Message::tool("call_x", "x", ToolStatus::Success)])
            .unwrap_err();

        assert_eq!(
            err,
            ConversationError::UnknownToolCall {
                position: 2,
                tool_call_id: "call_x".to_string()
            }
        );
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_append_tool_results_requires_assistant() {
        let mut state = ConversationState::with_question("q");
        let err = state
            .append_tool_results(vec![Message::tool("call_1", "x", ToolStatus::Success)])
            .unwrap_err();

        assert_eq!(err, ConversationError::OrphanToolResult { position: 1 });
    }

    #[test]
    fn test_append_tool_results_rejects_duplicates() {
        let mut state = seeded();
        let err = state
            .append_tool_results(vec![
                Message::tool("call_1", "a", ToolStatus::Success),
                Message::tool("call_1", "b", ToolStatus::Success),
            ])
            .unwrap_err();

        assert!(matches!(err, ConversationError::DuplicateToolResult { .. }));
    }

    #[test]
    fn test_validate_detects_result_for_older_call() {
        let mut state = seeded();
        state.append(Message::tool("call_1", "orders", ToolStatus::Success));
        state.append(Message::assistant_with_tool_calls(
            None,
            vec![ToolCall::new("call_2", "sql_db_schema", json!({}))],
        ));
        // Answers a call from an earlier assistant message
        state.append(Message::tool("call_1", "again", ToolStatus::Success));

        assert!(matches!(
            state.validate_tool_links(),
            Err(ConversationError::UnknownToolCall { position: 4, .. })
        ));
    }
}
