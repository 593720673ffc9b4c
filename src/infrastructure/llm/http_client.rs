use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::DomainError;

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &Value,
    ) -> Result<Value, DomainError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &Value,
    ) -> Result<Value, DomainError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::provider("http", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::provider(
                "http",
                format!("HTTP {}: {}", status, error_body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| DomainError::provider("http", format!("Failed to parse response: {}", e)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_post_json_sends_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(header("api-key", "secret"))
            .and(body_json(json!({"hello": "world"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let client = HttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        let response = client
            .post_json(
                &format!("{}/chat", server.uri()),
                vec![("api-key", "secret")],
                &json!({"hello": "world"}),
            )
            .await
            .unwrap();

        assert_eq!(response, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_post_json_reports_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = HttpClient::new()
            .post_json(&server.uri(), vec![], &json!({}))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("429"), "{}", message);
        assert!(message.contains("rate limited"), "{}", message);
    }
}
