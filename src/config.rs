//! LLM configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. built-in defaults ([`LlmConfig::default`])
//! 2. an optional YAML file passed with `--config`
//! 3. CLI flags / environment (`--api-base`, `--api-key`, `--model`)
//!
//! ```yaml
//! api_base: https://api.openai.com/v1
//! model: gpt-4o-mini
//! temperature: 0.7
//! seed: 42
//! max_retries: 3
//! retry_delay_secs: 3
//! validation_retries: 3
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, instrument};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API; `/chat/completions` is appended.
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub seed: i64,
    /// Extra attempts for a failed completion call.
    pub max_retries: usize,
    /// Fixed sleep between completion attempts.
    pub retry_delay_secs: u64,
    /// Extra extraction rounds when the model's answer does not validate.
    pub validation_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            seed: 42,
            max_retries: 3,
            retry_delay_secs: 3,
            validation_retries: 3,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("seed", &self.seed)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("validation_retries", &self.validation_retries)
            .finish()
    }
}

impl LlmConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from `path`, or return defaults when `None`.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let yaml = tokio::fs::read_to_string(path).await?;
        let config = Self::from_yaml(&yaml)?;
        info!(%path, model = %config.model, "Loaded configuration");
        Ok(config)
    }

    /// Apply CLI/environment values on top of the loaded configuration.
    pub fn with_overrides(
        mut self,
        api_base: Option<String>,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Self {
        if let Some(api_base) = api_base {
            self.api_base = api_base;
        }
        if api_key.is_some() {
            self.api_key = api_key;
        }
        if let Some(model) = model {
            self.model = model;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.seed, 42);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_secs, 3);
        assert_eq!(config.validation_retries, 3);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = LlmConfig::from_yaml("model: llama3\ntemperature: 0.0\n").unwrap();
        assert_eq!(config.model, "llama3");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_overrides_win() {
        let config = LlmConfig::from_yaml("model: llama3\napi_key: file-key\n")
            .unwrap()
            .with_overrides(Some("http://localhost:11434/v1".to_string()), None, Some("qwen".to_string()));
        assert_eq!(config.api_base, "http://localhost:11434/v1");
        assert_eq!(config.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.model, "qwen");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = LlmConfig::default().with_overrides(None, Some("sk-secret".to_string()), None);
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_load_without_path_is_default() {
        assert_eq!(LlmConfig::load(None).await.unwrap(), LlmConfig::default());
    }
}
