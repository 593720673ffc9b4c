//! Application state shared by the HTTP handlers

use std::sync::Arc;

use crate::domain::sql::SqlDatabase;
use crate::infrastructure::agent::SqlAgent;
use crate::infrastructure::session_store::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub agent: SqlAgent,
    pub sessions: SessionStore,
    pub database: Arc<dyn SqlDatabase>,
}

impl AppState {
    pub fn new(agent: SqlAgent, sessions: SessionStore, database: Arc<dyn SqlDatabase>) -> Self {
        Self {
            agent,
            sessions,
            database,
        }
    }
}
