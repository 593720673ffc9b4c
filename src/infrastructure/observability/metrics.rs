//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use regex::Regex;

use super::config::MetricsConfig;

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
    path: String,
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics")
            .field("path", &self.path)
            .finish()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    let builder = PrometheusBuilder::new();

    match builder.install_recorder() {
        Ok(handle) => {
            register_default_metrics();

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
                path: config.path.clone(),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

fn register_default_metrics() {
    gauge!("sql_agent_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics) -> Router {
    let path = metrics.path().to_string();
    Router::new()
        .route(&path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let status_str = status.to_string();
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status_str),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Record an LLM request metric
pub fn record_llm_request(params: LlmRequestMetricParams) {
    let labels = [
        ("provider", params.provider.to_string()),
        ("model", params.model.to_string()),
        ("node", params.node.to_string()),
        ("status", if params.success { "success" } else { "error" }.to_string()),
    ];

    counter!("llm_requests_total", &labels).increment(1);
    histogram!("llm_request_duration_seconds", &labels).record(params.duration.as_secs_f64());

    if let Some(tokens) = params.input_tokens {
        counter!("llm_input_tokens_total", &labels).increment(tokens);
    }

    if let Some(tokens) = params.output_tokens {
        counter!("llm_output_tokens_total", &labels).increment(tokens);
    }

    if !params.success {
        counter!("llm_errors_total", &labels).increment(1);
    }
}

/// Parameters for LLM request metrics
pub struct LlmRequestMetricParams<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub node: &'a str,
    pub duration: Duration,
    pub success: bool,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// Record a completed workflow step
pub fn record_step(node: &str, duration: Duration) {
    let labels = [("node", node.to_string())];

    counter!("agent_steps_total", &labels).increment(1);
    histogram!("agent_step_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record a tool call outcome
pub fn record_tool(tool: &str, success: bool) {
    let labels = [
        ("tool", tool.to_string()),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];

    counter!("agent_tool_calls_total", &labels).increment(1);
}

/// Record a finished turn
pub fn record_turn(status: &str, attempts: u32, total_tokens: u64, duration: Duration) {
    let labels = [("status", status.to_string())];

    counter!("agent_turns_total", &labels).increment(1);
    histogram!("agent_turn_duration_seconds", &labels).record(duration.as_secs_f64());
    histogram!("agent_turn_query_attempts", &labels).record(f64::from(attempts));
    counter!("agent_turn_tokens_total", &labels).increment(total_tokens);
}

/// Sanitize URL path for metric labels (remove IDs, limit cardinality)
fn sanitize_path(path: &str) -> String {
    let path = UUID_SEGMENT.replace_all(path, "{id}");
    let path = NUMERIC_SEGMENT.replace_all(&path, "/{id}$1");

    if path.len() > 50 {
        path.chars().take(50).collect()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_uuid() {
        let path = "/api/sessions/550e8400-e29b-41d4-a716-446655440000/turns";
        let sanitized = sanitize_path(path);
        assert_eq!(sanitized, "/api/sessions/{id}/turns");
    }

    #[test]
    fn test_sanitize_path_numeric_id() {
        let path = "/api/sessions/123/turns";
        let sanitized = sanitize_path(path);
        assert_eq!(sanitized, "/api/sessions/{id}/turns");
    }

    #[test]
    fn test_sanitize_path_no_id() {
        assert_eq!(sanitize_path("/health"), "/health");
    }

    #[test]
    fn test_sanitize_path_truncates_long_paths() {
        let path = "/very/long/path/that/exceeds/the/maximum/allowed/length/for/metrics";
        let sanitized = sanitize_path(path);
        assert!(sanitized.len() <= 50);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_step("generate_query", Duration::from_millis(5));
        record_tool("db_query_tool", false);
        record_turn("completed", 2, 120, Duration::from_millis(40));
    }
}
