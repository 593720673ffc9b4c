//! Per-request metrics and completion logging

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::infrastructure::observability::record_http_request;

/// Record duration and status of every request.
///
/// For SSE responses the duration covers only the time to the response
/// head; the turn itself is measured by the workflow metrics.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = route_path(&request);

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status().as_u16();

    record_http_request(method.as_str(), &path, status, duration);
    debug!(
        method = %method,
        path = %path,
        status,
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}

/// Matched route pattern, falling back to the raw path
fn route_path(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_path_falls_back_to_uri() {
        let request = Request::builder()
            .uri("/api/sessions/abc?x=1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(route_path(&request), "/api/sessions/abc");
    }
}
