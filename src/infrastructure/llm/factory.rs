use std::sync::Arc;
use std::time::Duration;

use super::azure_openai::{AzureAuth, AzureOpenAiConfig};
use super::http_client::HttpClient;
use super::{AzureOpenAiProvider, OpenAiProvider};
use crate::domain::llm::LlmProvider;
use crate::domain::DomainError;

/// Resolved settings for one language-model provider
#[derive(Debug, Clone)]
pub enum LlmProviderConfig {
    AzureOpenAi(AzureOpenAiConfig),
    OpenAi {
        api_key: String,
        base_url: Option<String>,
    },
}

/// Factory for creating LLM providers
#[derive(Debug)]
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create an LLM provider whose HTTP calls give up after `timeout`
    pub fn create(
        config: &LlmProviderConfig,
        timeout: Duration,
    ) -> Result<Arc<dyn LlmProvider>, DomainError> {
        let http_client = HttpClient::with_timeout(timeout)?;

        match config {
            LlmProviderConfig::AzureOpenAi(azure) => {
                Self::validate_azure(azure)?;
                Ok(Arc::new(AzureOpenAiProvider::new(http_client, azure.clone())))
            }

            LlmProviderConfig::OpenAi { api_key, base_url } => {
                if api_key.trim().is_empty() {
                    return Err(DomainError::configuration("OpenAI API key is not set"));
                }

                let provider = match base_url {
                    Some(url) => OpenAiProvider::with_base_url(http_client, api_key, url),
                    None => OpenAiProvider::new(http_client, api_key),
                };
                Ok(Arc::new(provider))
            }
        }
    }

    /// Create an OpenAI provider directly
    pub fn create_openai(api_key: impl Into<String>) -> Arc<dyn LlmProvider> {
        Arc::new(OpenAiProvider::new(HttpClient::new(), api_key))
    }

    /// Create an Azure OpenAI provider directly
    pub fn create_azure_openai(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Arc<dyn LlmProvider> {
        let config = AzureOpenAiConfig::new(endpoint, api_key);
        Arc::new(AzureOpenAiProvider::new(HttpClient::new(), config))
    }

    fn validate_azure(config: &AzureOpenAiConfig) -> Result<(), DomainError> {
        if config.endpoint.is_empty() {
            return Err(DomainError::configuration(
                "Azure OpenAI endpoint is not set",
            ));
        }

        let secret = match &config.auth {
            AzureAuth::ApiKey(key) => key,
            AzureAuth::AdToken(token) => token,
        };

        if secret.trim().is_empty() {
            return Err(DomainError::configuration(
                "Azure OpenAI requires an API key or an AD token",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[test]
    fn test_create_openai_provider() {
        let provider = LlmProviderFactory::create_openai("test-key");
        assert_eq!(provider.provider_name(), "openai");
    }

    #[test]
    fn test_create_azure_provider() {
        let provider =
            LlmProviderFactory::create_azure_openai("https://test.openai.azure.com", "test-key");
        assert_eq!(provider.provider_name(), "azure_openai");
    }

    #[test]
    fn test_factory_with_ad_token() {
        let config = LlmProviderConfig::AzureOpenAi(AzureOpenAiConfig::with_ad_token(
            "https://test.openai.azure.com",
            "token",
        ));

        let provider = LlmProviderFactory::create(&config, TIMEOUT).unwrap();
        assert_eq!(provider.provider_name(), "azure_openai");
    }

    #[test]
    fn test_factory_rejects_missing_azure_secret() {
        let config = LlmProviderConfig::AzureOpenAi(AzureOpenAiConfig::new(
            "https://test.openai.azure.com",
            "",
        ));

        let err = LlmProviderFactory::create(&config, TIMEOUT).unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[test]
    fn test_factory_rejects_missing_endpoint() {
        let config = LlmProviderConfig::AzureOpenAi(AzureOpenAiConfig::new("", "key"));
        assert!(LlmProviderFactory::create(&config, TIMEOUT).is_err());
    }

    #[test]
    fn test_factory_openai_with_base_url() {
        let config = LlmProviderConfig::OpenAi {
            api_key: "key".to_string(),
            base_url: Some("http://localhost:8080".to_string()),
        };

        let provider = LlmProviderFactory::create(&config, TIMEOUT).unwrap();
        assert_eq!(provider.provider_name(), "openai");
    }
}
