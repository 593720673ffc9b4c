//! `[observability]` section: OTLP export of the `agent_chain` turn spans
//! and the Prometheus endpoint for the HTTP, LLM and agent metrics

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Export of turn spans. Each turn is one `agent_chain` span carrying the
/// session id and token usage. LLM and tool events are recorded inside it.
#[derive(Debug, Clone, Deserialize)]
pub struct TracingConfig {
    /// Off by default; logs are written either way
    #[serde(default)]
    pub enabled: bool,
    /// gRPC collector address
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Fraction of turns whose spans are exported
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

/// Prometheus scrape endpoint for the `agent_*`, `llm_*` and `http_*` series
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Served at the root, outside `/api`
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "pmp-sql-agent".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: default_otlp_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}
