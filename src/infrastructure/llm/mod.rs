//! LLM provider implementations

mod azure_openai;
mod factory;
mod http_client;
mod openai;
mod wire;

pub use azure_openai::{AzureAuth, AzureOpenAiConfig, AzureOpenAiProvider};
pub use factory::{LlmProviderConfig, LlmProviderFactory};
pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::OpenAiProvider;
