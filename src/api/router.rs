use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::health;
use super::middleware::metrics_middleware;
use super::sessions;
use super::state::AppState;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Directory holding the chat page
pub const STATIC_DIR: &str = "public";

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/{id}/turns", post(sessions::create_turn))
        .route("/graph", get(sessions::get_graph))
}

/// Create the full router; the metrics endpoint is mounted when enabled
pub fn create_router(state: AppState, metrics: Option<PrometheusMetrics>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/api", api_router())
        .fallback_service(ServeDir::new(STATIC_DIR))
        .with_state(state);

    if let Some(metrics) = metrics {
        router = router.merge(create_metrics_router(metrics));
    }

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
