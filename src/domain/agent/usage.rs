//! Token accounting for a turn

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::domain::llm::{Message, Usage};

/// Minimum token count charged per model call
pub const BASE_TOKENS: u32 = 3;

const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a piece of text
pub fn estimate_tokens(text: &str) -> u32 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as u32
}

/// Estimate the tokens of a batch of messages, as sent in one call
pub fn estimate_message_tokens(messages: &[Message]) -> u32 {
    messages
        .iter()
        .filter_map(Message::content_text)
        .map(estimate_tokens)
        .fold(BASE_TOKENS, |acc, n| acc.saturating_add(n))
}

/// Prompt and completion tokens accumulated over one or more model calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }

    pub fn is_zero(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0
    }

    /// Usage for one call: what the provider reported, or an estimate from
    /// the request and reply when it reported nothing.
    pub fn for_call(reported: Option<Usage>, request: &[Message], reply: &Message) -> Self {
        match reported {
            Some(usage) => Self::new(usage.prompt_tokens, usage.completion_tokens),
            None => Self::new(
                estimate_message_tokens(request),
                estimate_message_tokens(std::slice::from_ref(reply)),
            ),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
    }
}
