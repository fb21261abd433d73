use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::provider::Provider;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Process-wide settings. Loaded once at startup and passed to whatever
/// needs store or AI-service access.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub database_path: Option<PathBuf>,
    pub metadata_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub gemini_api_key: Option<String>,
    pub claude_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub ollama_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::Gemini.as_str().to_string()),
            ..Default::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Config file plus environment overrides; a missing or unreadable file
    /// falls back to defaults.
    pub fn from_environment() -> Self {
        let config = Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read config file, using defaults");
            Self::new()
        });
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Environment values win over the file. Empty values are ignored.
    pub fn with_env_overrides<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("COLORFUL_PROVIDER") {
            self.provider = Some(v);
        }
        if let Some(v) = var("COLORFUL_MODEL") {
            self.default_model = Some(v);
        }
        if let Some(v) = var("COLORFUL_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("COLORFUL_METADATA_PATH") {
            self.metadata_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("COLORFUL_BIND") {
            self.bind_address = Some(v);
        }
        if let Some(v) = var("GOOGLE_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = var("ANTHROPIC_API_KEY") {
            self.claude_api_key = Some(v);
        }
        if let Some(v) = var("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = var("OLLAMA_URL") {
            self.ollama_url = Some(v);
        }
        if let Some(v) = var("COLORFUL_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = Some(v);
        }
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or(Provider::Gemini)
    }

    pub fn model(&self) -> String {
        self.default_model
            .clone()
            .unwrap_or_else(|| self.provider().default_model().to_string())
    }

    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Gemini => self.gemini_api_key.as_deref(),
            Provider::Claude => self.claude_api_key.as_deref(),
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Ollama => None,
        }
    }

    pub fn database_path(&self) -> Result<&Path, AnalysisError> {
        self.database_path
            .as_deref()
            .ok_or(AnalysisError::NotConfigured("Database connection"))
    }

    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS)
    }

    pub fn ollama_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("colorful-scriptures").join("config.json"))
    }
}
