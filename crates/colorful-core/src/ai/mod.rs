pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeClient;
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use crate::config::Config;
use crate::error::AnalysisError;
use crate::provider::Provider;

#[derive(Clone)]
pub enum ProviderClient {
    Gemini(GeminiClient),
    Claude(ClaudeClient),
    OpenAI(OpenAIClient),
    Ollama(OllamaClient),
}

/// Sends one prompt to the configured provider and returns its raw text.
#[derive(Clone)]
pub struct CompletionClient {
    backend: ProviderClient,
    model: String,
}

impl CompletionClient {
    pub fn new(backend: ProviderClient, model: &str) -> Self {
        Self {
            backend,
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AnalysisError> {
        let provider = config.provider();
        let timeout = config.timeout();
        let key = if provider.requires_api_key() {
            config.api_key(provider).ok_or_else(|| {
                tracing::error!(provider = provider.as_str(), "AI API key missing");
                AnalysisError::NotConfigured("AI API key")
            })?
        } else {
            ""
        };

        let backend = match provider {
            Provider::Gemini => ProviderClient::Gemini(GeminiClient::new(key).with_timeout(timeout)),
            Provider::Claude => ProviderClient::Claude(ClaudeClient::new(key).with_timeout(timeout)),
            Provider::OpenAI => ProviderClient::OpenAI(OpenAIClient::new(key).with_timeout(timeout)),
            Provider::Ollama => {
                ProviderClient::Ollama(OllamaClient::new(config.ollama_url()).with_timeout(timeout))
            }
        };
        Ok(Self::new(backend, &config.model()))
    }

    pub fn provider(&self) -> Provider {
        match self.backend {
            ProviderClient::Gemini(_) => Provider::Gemini,
            ProviderClient::Claude(_) => Provider::Claude,
            ProviderClient::OpenAI(_) => Provider::OpenAI,
            ProviderClient::Ollama(_) => Provider::Ollama,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        tracing::debug!(
            provider = self.provider().as_str(),
            model = %self.model,
            prompt_len = prompt.len(),
            "requesting completion"
        );
        match &self.backend {
            ProviderClient::Gemini(client) => client.query(&self.model, prompt).await,
            ProviderClient::Claude(client) => client.query(&self.model, prompt).await,
            ProviderClient::OpenAI(client) => client.query(&self.model, prompt).await,
            ProviderClient::Ollama(client) => client.query_json(&self.model, prompt).await,
        }
    }

    /// Models offered by the provider; Ollama is asked, hosted providers use a fixed list.
    pub async fn available_models(&self) -> Result<Vec<String>, AnalysisError> {
        match &self.backend {
            ProviderClient::Gemini(_) => Ok(GeminiClient::list_models()),
            ProviderClient::Claude(_) => Ok(ClaudeClient::list_models()),
            ProviderClient::OpenAI(_) => Ok(OpenAIClient::list_models()),
            ProviderClient::Ollama(client) => client.list_models().await,
        }
    }
}
