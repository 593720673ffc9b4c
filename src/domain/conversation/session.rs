//! Chat sessions: the history of completed turns for one user

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::agent::{AgentError, TokenUsage};
use crate::domain::llm::Message;
use crate::domain::DomainError;

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    Failed,
}

/// One finished turn as kept in the session history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnRecord {
    pub question: String,
    pub transcript: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub usage: TokenUsage,
    pub status: TurnStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub busy: bool,
    pub usage: TokenUsage,
    pub turns: Vec<TurnRecord>,
}

#[derive(Debug, Default)]
struct SessionHistory {
    turns: Vec<TurnRecord>,
    usage: TokenUsage,
}

/// A chat session.
///
/// At most one turn runs against a session at a time: [`ChatSession::begin_turn`]
/// hands out a [`TurnGuard`] and refuses a second one while it is alive.
pub struct ChatSession {
    id: String,
    created_at: DateTime<Utc>,
    in_flight: AtomicBool,
    history: RwLock<SessionHistory>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            in_flight: AtomicBool::new(false),
            history: RwLock::new(SessionHistory::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the session for a new turn
    pub fn begin_turn(
        self: &Arc<Self>,
        question: impl Into<String>,
    ) -> Result<TurnGuard, AgentError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AgentError::session_busy(&self.id))?;

        Ok(TurnGuard {
            session: Arc::clone(self),
            question: question.into(),
            started_at: Utc::now(),
        })
    }

    pub fn turns(&self) -> Result<Vec<TurnRecord>, DomainError> {
        let history = self
            .history
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;
        Ok(history.turns.clone())
    }

    /// Cumulative token usage over all recorded turns
    pub fn usage(&self) -> Result<TokenUsage, DomainError> {
        let history = self
            .history
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;
        Ok(history.usage)
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, DomainError> {
        let history = self
            .history
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;

        Ok(SessionSnapshot {
            id: self.id.clone(),
            created_at: self.created_at,
            busy: self.is_busy(),
            usage: history.usage,
            turns: history.turns.clone(),
        })
    }

    fn record(&self, record: TurnRecord) -> Result<(), DomainError> {
        let mut history = self
            .history
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))?;
        history.usage += record.usage;
        history.turns.push(record);
        Ok(())
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("busy", &self.is_busy())
            .finish()
    }
}

/// Exclusive claim on a session for one turn.
///
/// Dropping the guard without calling [`TurnGuard::complete`] or
/// [`TurnGuard::fail`] abandons the turn: nothing is recorded and the
/// session accepts a new turn.
#[derive(Debug)]
pub struct TurnGuard {
    session: Arc<ChatSession>,
    question: String,
    started_at: DateTime<Utc>,
}

impl TurnGuard {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    /// Record a successful turn
    pub fn complete(
        self,
        transcript: Vec<Message>,
        answer: impl Into<String>,
        usage: TokenUsage,
    ) -> Result<TurnRecord, DomainError> {
        let record = TurnRecord {
            question: self.question.clone(),
            transcript,
            answer: Some(answer.into()),
            error: None,
            usage,
            status: TurnStatus::Completed,
            started_at: self.started_at,
            finished_at: Utc::now(),
        };
        self.session.record(record.clone())?;
        Ok(record)
    }

    /// Record a failed turn. Earlier turns are left untouched.
    pub fn fail(
        self,
        transcript: Vec<Message>,
        error: impl Into<String>,
        usage: TokenUsage,
    ) -> Result<TurnRecord, DomainError> {
        let record = TurnRecord {
            question: self.question.clone(),
            transcript,
            answer: None,
            error: Some(error.into()),
            usage,
            status: TurnStatus::Failed,
            started_at: self.started_at,
            finished_at: Utc::now(),
        };
        self.session.record(record.clone())?;
        Ok(record)
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.session.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let session = ChatSession::new();
        assert!(!session.is_busy());
        assert!(session.turns().unwrap().is_empty());
        assert!(Uuid::parse_str(session.id()).is_ok());
    }

    #[test]
    fn test_second_turn_refused_while_in_flight() {
        let session = Arc::new(ChatSession::with_id("s1"));
        let guard = session.begin_turn("first").unwrap();

        let err = session.begin_turn("second").unwrap_err();
        assert!(matches!(err, AgentError::SessionBusy { ref session_id } if session_id == "s1"));

        drop(guard);
        assert!(session.begin_turn("third").is_ok());
    }

    #[test]
    fn test_complete_records_turn_and_usage() {
        let session = Arc::new(ChatSession::new());
        let guard = session.begin_turn("How many orders?").unwrap();

        let record = guard
            .complete(
                vec![Message::user("How many orders?"), Message::assistant("42")],
                "There are 42 orders.",
                TokenUsage::new(100, 20),
            )
            .unwrap();

        assert_eq!(record.status, TurnStatus::Completed);
        assert!(!session.is_busy());
        assert_eq!(session.turns().unwrap().len(), 1);
        assert_eq!(session.usage().unwrap().total_tokens(), 120);
    }

    #[test]
    fn test_failed_turn_keeps_prior_history() {
        let session = Arc::new(ChatSession::new());
        session
            .begin_turn("first")
            .unwrap()
            .complete(vec![], "answer", TokenUsage::new(10, 5))
            .unwrap();

        session
            .begin_turn("second")
            .unwrap()
            .fail(vec![], "Language model call failed", TokenUsage::new(4, 0))
            .unwrap();

        let turns = session.turns().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].answer.as_deref(), Some("answer"));
        assert_eq!(turns[1].status, TurnStatus::Failed);
        assert_eq!(session.usage().unwrap(), TokenUsage::new(14, 5));
    }

    #[test]
    fn test_abandoned_turn_records_nothing() {
        let session = Arc::new(ChatSession::new());
        {
            let _guard = session.begin_turn("dropped").unwrap();
            assert!(session.is_busy());
        }

        assert!(!session.is_busy());
        assert!(session.turns().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let session = Arc::new(ChatSession::with_id("abc"));
        let json = serde_json::to_value(session.snapshot().unwrap()).unwrap();

        assert_eq!(json["id"], "abc");
        assert_eq!(json["busy"], false);
        assert!(json["turns"].as_array().unwrap().is_empty());
    }
}
