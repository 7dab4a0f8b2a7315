//! LLM integration.
//!
//! Only Anthropic is wired up. Everything downstream talks to the
//! `LlmProvider` trait so curation passes can be stubbed in tests.

pub mod anthropic;
pub mod json;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use json::{extract_json_array, extract_json_object};
pub use provider::*;

use std::sync::Arc;

use secrecy::SecretString;

use crate::config::DEFAULT_MODEL;
use crate::error::{ConfigError, LlmError};

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))?;
        Ok(Self {
            backend: LlmBackend::Anthropic,
            api_key: SecretString::from(api_key),
            base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            model: std::env::var("GIFTWISE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.backend {
        LlmBackend::Anthropic => {
            tracing::info!("Using Anthropic (model: {})", config.model);
            Ok(Arc::new(AnthropicProvider::new(
                config.api_key.clone(),
                config.base_url.clone(),
                config.model.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_provider_keeps_model_name() {
        let config = LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: SecretString::from("test-key"),
            base_url: "http://localhost".to_string(),
            model: "claude-3-5-haiku-latest".to_string(),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "claude-3-5-haiku-latest");
        let (input, output) = provider.cost_per_token();
        assert!(output > input);
    }
}
