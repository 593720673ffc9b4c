//! Health check endpoints for Kubernetes

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use super::state::AppState;
use crate::domain::sql::SqlDatabase;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Returns 200 while the process is serving
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: None,
        latency_ms: None,
    };

    (StatusCode::OK, Json(response))
}

/// Ready once the database answers
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let database = check_database(state.database.as_ref()).await;
    let status = database.status;

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: Some(vec![database]),
        latency_ms: Some(start.elapsed().as_millis() as u64),
    };

    let status_code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

async fn check_database(database: &dyn SqlDatabase) -> HealthCheck {
    let start = Instant::now();
    let result = database.ping().await;
    let latency_ms = Some(start.elapsed().as_millis() as u64);

    match result {
        Ok(()) => HealthCheck {
            name: "database".to_string(),
            status: HealthStatus::Healthy,
            message: None,
            latency_ms,
        },
        Err(e) => HealthCheck {
            name: "database".to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(e.to_string()),
            latency_ms,
        },
    }
}
