use async_trait::async_trait;

use super::wire;
use super::HttpClientTrait;
use crate::domain::llm::{LlmProvider, LlmRequest, LlmResponse};
use crate::domain::DomainError;

const DEFAULT_API_VERSION: &str = "2024-02-01";

/// How requests to Azure OpenAI are authenticated
#[derive(Clone, PartialEq, Eq)]
pub enum AzureAuth {
    /// Resource key, sent as the `api-key` header
    ApiKey(String),
    /// Azure AD access token, sent as a bearer token
    AdToken(String),
}

impl AzureAuth {
    fn header(&self) -> (&'static str, String) {
        match self {
            Self::ApiKey(key) => ("api-key", key.clone()),
            Self::AdToken(token) => ("Authorization", format!("Bearer {}", token)),
        }
    }
}

impl std::fmt::Debug for AzureAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
            Self::AdToken(_) => f.write_str("AdToken(***)"),
        }
    }
}

/// Azure OpenAI configuration
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    pub auth: AzureAuth,
    pub api_version: String,
}

impl AzureOpenAiConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_auth(endpoint, AzureAuth::ApiKey(api_key.into()))
    }

    pub fn with_ad_token(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_auth(endpoint, AzureAuth::AdToken(token.into()))
    }

    fn with_auth(endpoint: impl Into<String>, auth: AzureAuth) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            auth,
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }
}

/// Azure OpenAI provider; the `model` passed to `chat` is the deployment name
#[derive(Debug)]
pub struct AzureOpenAiProvider<C: HttpClientTrait> {
    client: C,
    config: AzureOpenAiConfig,
    auth_header: (&'static str, String),
}

impl<C: HttpClientTrait> AzureOpenAiProvider<C> {
    pub fn new(client: C, config: AzureOpenAiConfig) -> Self {
        let auth_header = config.auth.header();
        Self {
            client,
            config,
            auth_header,
        }
    }

    fn build_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint, deployment, self.config.api_version
        )
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            (self.auth_header.0, self.auth_header.1.as_str()),
            ("Content-Type", "application/json"),
        ]
    }
}

#[async_trait]
impl<C: HttpClientTrait + 'static> LlmProvider for AzureOpenAiProvider<C> {
    async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError> {
        let url = self.build_url(model);
        let body = wire::build_body(None, &request);

        let response = self.client.post_json(&url, self.headers(), &body).await?;

        wire::parse_response(self.provider_name(), response)
    }

    fn provider_name(&self) -> &'static str {
        "azure_openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{FinishReason, ToolChoice, ToolDefinition};
    use crate::infrastructure::llm::http_client::mock::MockHttpClient;
    use serde_json::json;

    const URL: &str = "https://myresource.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01";

    fn text_response(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-123",
            "model": "gpt-4o",
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
    }

    #[tokio::test]
    async fn test_azure_openai_chat() {
        let client = MockHttpClient::new().with_response(URL, text_response("There are 3 customers."));
        let config = AzureOpenAiConfig::new("https://myresource.openai.azure.com/", "test-key");
        let provider = AzureOpenAiProvider::new(client, config);

        let request = LlmRequest::builder().user("How many customers?").build();
        let response = provider.chat("gpt-4o", request).await.unwrap();

        assert_eq!(response.content(), Some("There are 3 customers."));
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[tokio::test]
    async fn test_azure_openai_sends_tools_and_api_key() {
        let client = MockHttpClient::new().with_response(
            URL,
            json!({
                "id": "chatcmpl-1",
                "model": "gpt-4o",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "sql_db_schema", "arguments": "{\"table_names\": \"customers\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            }),
        );
        let config = AzureOpenAiConfig::new("https://myresource.openai.azure.com", "test-key");
        let provider = AzureOpenAiProvider::new(client, config);

        let request = LlmRequest::builder()
            .user("Which customers are in California?")
            .tool(ToolDefinition::new("sql_db_schema", "Get schema", json!({"type": "object"})))
            .tool_choice(ToolChoice::Function("sql_db_schema".to_string()))
            .build();
        let response = provider.chat("gpt-4o", request).await.unwrap();

        let call = &response.message.tool_calls()[0];
        assert_eq!(call.name, "sql_db_schema");
        assert_eq!(call.argument_str("table_names"), Some("customers"));

        let sent = provider.client.last_request().unwrap();
        assert_eq!(sent.header("api-key"), Some("test-key"));
        assert!(sent.body.get("model").is_none());
        assert_eq!(sent.body["tool_choice"]["function"]["name"], "sql_db_schema");
    }

    #[tokio::test]
    async fn test_azure_openai_ad_token_auth() {
        let client = MockHttpClient::new().with_response(URL, text_response("ok"));
        let config =
            AzureOpenAiConfig::with_ad_token("https://myresource.openai.azure.com", "ad-token");
        let provider = AzureOpenAiProvider::new(client, config);

        provider
            .chat("gpt-4o", LlmRequest::builder().user("hi").build())
            .await
            .unwrap();

        let sent = provider.client.last_request().unwrap();
        assert_eq!(sent.header("Authorization"), Some("Bearer ad-token"));
        assert_eq!(sent.header("api-key"), None);
    }

    #[tokio::test]
    async fn test_azure_openai_propagates_http_errors() {
        let client = MockHttpClient::new().with_error(URL, "HTTP 401: unauthorized");
        let provider = AzureOpenAiProvider::new(
            client,
            AzureOpenAiConfig::new("https://myresource.openai.azure.com", "bad"),
        );

        let err = provider
            .chat("gpt-4o", LlmRequest::builder().user("hi").build())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_azure_openai_url_building() {
        let config = AzureOpenAiConfig::new("https://myresource.openai.azure.com", "test-key")
            .with_api_version("2024-06-01");
        let provider = AzureOpenAiProvider::new(MockHttpClient::new(), config);

        assert_eq!(
            provider.build_url("my-deployment"),
            "https://myresource.openai.azure.com/openai/deployments/my-deployment/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_auth_debug_hides_secret() {
        let auth = AzureAuth::ApiKey("secret".to_string());
        assert!(!format!("{:?}", auth).contains("secret"));
    }
}
