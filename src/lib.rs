//! PMP SQL Agent
//!
//! Answers natural-language questions about a relational database by
//! driving a language model through a fixed query workflow:
//! - schema discovery through tool calls
//! - query generation, validation and execution with bounded retries
//! - streamed progress over HTTP (SSE) or in the terminal

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::sql::SqlDatabase;
use infrastructure::agent::SqlAgent;
use infrastructure::llm::LlmProviderFactory;
use infrastructure::session_store::SessionStore;
use infrastructure::sql::PostgresDatabase;
use tracing::info;

/// Create the application state with all services initialized
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let database = connect_database(config).await?;
    let agent = build_agent(config, Arc::clone(&database))?;
    let sessions = SessionStore::with_config(config.session_store_config());

    Ok(AppState::new(agent, sessions, database))
}

/// Open the connection pool to the configured database
pub async fn connect_database(config: &AppConfig) -> anyhow::Result<Arc<dyn SqlDatabase>> {
    let pg_config = config.postgres_config()?;

    info!(schema = %pg_config.schema, "Connecting to PostgreSQL...");
    let database = PostgresDatabase::connect(pg_config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to PostgreSQL: {}", e))?;
    info!("PostgreSQL connection established");

    Ok(Arc::new(database))
}

/// Build the agent on top of the configured language model provider
pub fn build_agent(config: &AppConfig, database: Arc<dyn SqlDatabase>) -> anyhow::Result<SqlAgent> {
    let provider_config = config.llm_provider_config()?;
    let llm = LlmProviderFactory::create(&provider_config, config.llm_timeout())?;
    info!(provider = llm.provider_name(), "LLM provider initialized");

    Ok(SqlAgent::new(llm, database, config.agent_config()))
}
