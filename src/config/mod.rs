//! Layered application configuration

mod app_config;

pub use app_config::{
    AgentSettings, AppConfig, DatabaseSettings, LlmProviderKind, LlmSettings, LogFormat,
    LoggingConfig, ServerConfig,
};
