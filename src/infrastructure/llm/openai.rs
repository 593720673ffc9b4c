use async_trait::async_trait;

use super::http_client::HttpClientTrait;
use super::wire;
use crate::domain::llm::{LlmProvider, LlmRequest, LlmResponse};
use crate::domain::DomainError;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// OpenAI API provider, also usable against compatible servers via a base URL
#[derive(Debug)]
pub struct OpenAiProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
}

impl<C: HttpClientTrait> OpenAiProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }
}

#[async_trait]
impl<C: HttpClientTrait + 'static> LlmProvider for OpenAiProvider<C> {
    async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError> {
        let url = self.chat_completions_url();
        let body = wire::build_body(Some(model), &request);

        let response = self.client.post_json(&url, self.headers(), &body).await?;

        wire::parse_response(self.provider_name(), response)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
