use std::time::Duration;

use serde::Deserialize;

use crate::domain::DomainError;
use crate::infrastructure::agent::SqlAgentConfig;
use crate::infrastructure::llm::{AzureOpenAiConfig, LlmProviderConfig};
use crate::infrastructure::logging;
use crate::infrastructure::observability::ObservabilityConfig;
use crate::infrastructure::session_store::SessionStoreConfig;
use crate::infrastructure::sql::PostgresConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub observability: ObservabilityConfig,
    pub llm: LlmSettings,
    pub database: DatabaseSettings,
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderKind {
    #[default]
    AzureOpenai,
    Openai,
}

/// Language model settings; empty values fall back to the usual
/// `AZURE_OPENAI_*` / `OPENAI_API_KEY` environment variables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProviderKind,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub ad_token: Option<String>,
    /// Azure deployment, or the model name for OpenAI
    pub deployment: Option<String>,
    pub api_version: Option<String>,
    /// OpenAI-compatible base URL
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub schema: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub sample_rows: u32,
    pub max_cell_chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// 0 disables the limit
    pub max_query_attempts: u32,
    pub max_steps: usize,
    pub session_ttl_secs: u64,
    pub max_sessions: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            endpoint: None,
            api_key: None,
            ad_token: None,
            deployment: None,
            api_version: None,
            base_url: None,
            temperature: Some(0.0),
            timeout_secs: 60,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        let postgres = PostgresConfig::default();
        Self {
            url: None,
            schema: postgres.schema,
            max_connections: postgres.max_connections,
            min_connections: postgres.min_connections,
            connect_timeout_secs: postgres.connect_timeout_secs,
            idle_timeout_secs: postgres.idle_timeout_secs,
            sample_rows: postgres.sample_rows,
            max_cell_chars: postgres.max_cell_chars,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        let agent = SqlAgentConfig::default();
        Self {
            max_query_attempts: agent.max_query_attempts,
            max_steps: agent.max_steps,
            session_ttl_secs: 3600,
            max_sessions: 10_000,
        }
    }
}

impl AppConfig {
    /// Load `config/default`, `config/local` and `APP__*` variables, then
    /// fill credentials from the process environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        Ok(config.with_env_fallbacks(|name| std::env::var(name).ok()))
    }

    /// Fill unset credentials from well-known variables
    pub fn with_env_fallbacks(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let llm = &mut self.llm;

        let key_var = match llm.provider {
            LlmProviderKind::AzureOpenai => "AZURE_OPENAI_API_KEY",
            LlmProviderKind::Openai => "OPENAI_API_KEY",
        };

        fill(&mut llm.api_key, || lookup(key_var));
        fill(&mut llm.endpoint, || lookup("AZURE_OPENAI_ENDPOINT"));
        fill(&mut llm.ad_token, || lookup("AZURE_OPENAI_AD_TOKEN"));
        fill(&mut llm.api_version, || lookup("AZURE_OPENAI_VERSION"));
        if llm.provider == LlmProviderKind::AzureOpenai {
            fill(&mut llm.deployment, || {
                lookup("AZURE_OPENAI_COMPLETION_DEPLOYMENT_NAME")
            });
        }
        fill(&mut self.database.url, || lookup("DATABASE_URL"));

        self
    }

    /// Provider settings; an Azure API key wins over an AD token
    pub fn llm_provider_config(&self) -> Result<LlmProviderConfig, DomainError> {
        let llm = &self.llm;

        match llm.provider {
            LlmProviderKind::AzureOpenai => {
                let endpoint = present(&llm.endpoint).ok_or_else(|| {
                    DomainError::configuration("AZURE_OPENAI_ENDPOINT is not set")
                })?;

                let mut azure = match (present(&llm.api_key), present(&llm.ad_token)) {
                    (Some(key), _) => AzureOpenAiConfig::new(endpoint, key),
                    (None, Some(token)) => AzureOpenAiConfig::with_ad_token(endpoint, token),
                    (None, None) => {
                        return Err(DomainError::configuration(
                            "Either AZURE_OPENAI_API_KEY or AZURE_OPENAI_AD_TOKEN must be set",
                        ));
                    }
                };

                if let Some(version) = present(&llm.api_version) {
                    azure = azure.with_api_version(version);
                }

                Ok(LlmProviderConfig::AzureOpenAi(azure))
            }
            LlmProviderKind::Openai => {
                let api_key = present(&llm.api_key)
                    .ok_or_else(|| DomainError::configuration("OPENAI_API_KEY is not set"))?;

                Ok(LlmProviderConfig::OpenAi {
                    api_key: api_key.to_string(),
                    base_url: present(&llm.base_url).map(str::to_string),
                })
            }
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    pub fn postgres_config(&self) -> Result<PostgresConfig, DomainError> {
        let db = &self.database;
        let url = present(&db.url)
            .ok_or_else(|| DomainError::configuration("DATABASE_URL is not set"))?;

        Ok(PostgresConfig::new(url)
            .with_schema(db.schema.clone())
            .with_max_connections(db.max_connections)
            .with_min_connections(db.min_connections)
            .with_connect_timeout(db.connect_timeout_secs)
            .with_idle_timeout(db.idle_timeout_secs)
            .with_sample_rows(db.sample_rows)
            .with_max_cell_chars(db.max_cell_chars))
    }

    pub fn agent_config(&self) -> SqlAgentConfig {
        let model = present(&self.llm.deployment).unwrap_or("gpt-4o");

        SqlAgentConfig::default()
            .with_model(model)
            .with_temperature(self.llm.temperature)
            .with_max_query_attempts(self.agent.max_query_attempts)
            .with_max_steps(self.agent.max_steps)
            .with_max_cell_chars(self.database.max_cell_chars)
    }

    pub fn session_store_config(&self) -> SessionStoreConfig {
        SessionStoreConfig::default()
            .with_max_sessions(self.agent.max_sessions)
            .with_idle_ttl(Duration::from_secs(self.agent.session_ttl_secs))
    }

    pub fn logging_config(&self) -> logging::LoggingConfig {
        logging::LoggingConfig {
            level: self.logging.level.clone(),
            format: self.logging.format.clone(),
        }
    }
}

fn fill(slot: &mut Option<String>, fallback: impl FnOnce() -> Option<String>) {
    if present(slot).is_none() {
        *slot = fallback();
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::llm::AzureAuth;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn from_json(json: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(json, config::FileFormat::Json))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.llm.provider, LlmProviderKind::AzureOpenai);
        assert_eq!(config.llm.temperature, Some(0.0));
        assert_eq!(config.agent.max_query_attempts, 5);
        assert_eq!(config.database.schema, "public");
        assert_eq!(config.database.sample_rows, 3);
    }

    #[test]
    fn test_partial_sections_deserialize() {
        let config = from_json(
            r#"{
                "server": {"port": 9000},
                "logging": {"format": "json"},
                "llm": {"provider": "openai", "deployment": "gpt-4o-mini"},
                "agent": {"max_query_attempts": 0}
            }"#,
        );

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.llm.provider, LlmProviderKind::Openai);
        assert_eq!(config.agent.max_query_attempts, 0);
        assert_eq!(config.agent.max_sessions, 10_000);
        assert_eq!(config.agent_config().model, "gpt-4o-mini");
    }

    #[test]
    fn test_azure_env_fallbacks() {
        let config = AppConfig::default().with_env_fallbacks(env(&[
            ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com"),
            ("AZURE_OPENAI_API_KEY", "key"),
            ("AZURE_OPENAI_COMPLETION_DEPLOYMENT_NAME", "sql-gpt"),
            ("AZURE_OPENAI_VERSION", "2024-06-01"),
            ("DATABASE_URL", "postgres://localhost/shop"),
        ]));

        let LlmProviderConfig::AzureOpenAi(azure) = config.llm_provider_config().unwrap() else {
            panic!("expected azure config");
        };
        assert_eq!(azure.endpoint, "https://res.openai.azure.com");
        assert_eq!(azure.auth, AzureAuth::ApiKey("key".to_string()));
        assert_eq!(azure.api_version, "2024-06-01");
        assert_eq!(config.agent_config().model, "sql-gpt");
        assert_eq!(config.postgres_config().unwrap().url, "postgres://localhost/shop");
    }

    #[test]
    fn test_configured_values_beat_environment() {
        let mut config = AppConfig::default();
        config.llm.endpoint = Some("https://configured.openai.azure.com".to_string());
        config.database.url = Some("postgres://configured/db".to_string());

        let config = config.with_env_fallbacks(env(&[
            ("AZURE_OPENAI_ENDPOINT", "https://env.openai.azure.com"),
            ("DATABASE_URL", "postgres://env/db"),
        ]));

        assert_eq!(
            config.llm.endpoint.as_deref(),
            Some("https://configured.openai.azure.com")
        );
        assert_eq!(config.database.url.as_deref(), Some("postgres://configured/db"));
    }

    #[test]
    fn test_azure_ad_token_when_key_absent() {
        let config = AppConfig::default().with_env_fallbacks(env(&[
            ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com"),
            ("AZURE_OPENAI_API_KEY", "  "),
            ("AZURE_OPENAI_AD_TOKEN", "token"),
        ]));

        let LlmProviderConfig::AzureOpenAi(azure) = config.llm_provider_config().unwrap() else {
            panic!("expected azure config");
        };
        assert_eq!(azure.auth, AzureAuth::AdToken("token".to_string()));
    }

    #[test]
    fn test_azure_without_credentials_fails() {
        let config = AppConfig::default().with_env_fallbacks(env(&[(
            "AZURE_OPENAI_ENDPOINT",
            "https://res.openai.azure.com",
        )]));

        let err = config.llm_provider_config().unwrap_err();
        assert!(err.to_string().contains("AZURE_OPENAI_AD_TOKEN"));
    }

    #[test]
    fn test_openai_uses_openai_key() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProviderKind::Openai;
        let config = config.with_env_fallbacks(env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("AZURE_OPENAI_API_KEY", "azure"),
        ]));

        let LlmProviderConfig::OpenAi { api_key, base_url } =
            config.llm_provider_config().unwrap()
        else {
            panic!("expected openai config");
        };
        assert_eq!(api_key, "sk-test");
        assert_eq!(base_url, None);
        assert_eq!(config.agent_config().model, "gpt-4o");
    }

    #[test]
    fn test_missing_database_url() {
        let err = AppConfig::default().postgres_config().unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[test]
    fn test_session_store_config() {
        let mut config = AppConfig::default();
        config.agent.session_ttl_secs = 60;
        config.agent.max_sessions = 5;

        let store = config.session_store_config();
        assert_eq!(store.idle_ttl, Duration::from_secs(60));
        assert_eq!(store.max_sessions, 5);
    }
}
