//! In-memory chat session store using moka

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::domain::conversation::ChatSession;

/// Configuration for the session store
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Maximum number of live sessions
    pub max_sessions: u64,
    /// Sessions not touched for this long are evicted
    pub idle_ttl: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            idle_ttl: Duration::from_secs(3600),
        }
    }
}

impl SessionStoreConfig {
    pub fn with_max_sessions(mut self, max: u64) -> Self {
        self.max_sessions = max;
        self
    }

    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }
}

/// Live chat sessions keyed by id.
///
/// Sessions are created on first use, kept while active and evicted after
/// being idle for the configured TTL or on explicit removal.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: MokaCache<String, Arc<ChatSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_config(SessionStoreConfig::default())
    }

    pub fn with_config(config: SessionStoreConfig) -> Self {
        let sessions = MokaCache::builder()
            .max_capacity(config.max_sessions)
            .time_to_idle(config.idle_ttl)
            .build();

        Self { sessions }
    }

    /// Create and register a new session
    pub async fn create(&self) -> Arc<ChatSession> {
        let session = Arc::new(ChatSession::new());
        self.sessions
            .insert(session.id().to_string(), Arc::clone(&session))
            .await;
        debug!(session_id = %session.id(), "Created session");
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<ChatSession>> {
        self.sessions.get(id).await
    }

    /// Fetch a session, creating it under the given id when unknown
    pub async fn get_or_create(&self, id: &str) -> Arc<ChatSession> {
        self.sessions
            .get_with(id.to_string(), async {
                debug!(session_id = %id, "Created session on first turn");
                Arc::new(ChatSession::with_id(id))
            })
            .await
    }

    /// End a session. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).await.is_some()
    }

    pub fn len(&self) -> u64 {
        self.sessions.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
