//! Conversation transcript and chat sessions

mod session;
mod state;

pub use session::{ChatSession, SessionSnapshot, TurnGuard, TurnRecord, TurnStatus};
pub use state::{ConversationError, ConversationState};
