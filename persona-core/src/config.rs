use crate::error::{ConfigError, CoreError};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "persona.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditSettings,
    pub retry: RetrySettings,
    pub collection: CollectionSettings,
    pub inference: InferenceSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: String,
    pub requests_per_minute: u32,
    pub burst: u32,
    /// Listing page size, Reddit caps this at 100.
    pub page_size: u32,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: format!("reddit-persona/{}", env!("CARGO_PKG_VERSION")),
            requests_per_minute: 60,
            burst: 10,
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            jitter_factor: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub output_dir: PathBuf,
    /// Upper bound for one whole collection run.
    pub deadline_secs: u64,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("exports"),
            deadline_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub endpoint: String,
    pub api_token: Option<String>,
    pub personality_model: String,
    /// Names for the personality model's output labels, in label-index order.
    pub personality_labels: Vec<String>,
    pub emotion_model: String,
    pub embedding_model: String,
    pub max_input_chars: usize,
    pub timeout_secs: u64,
}

impl InferenceSettings {
    /// The API token, required for any hosted model call.
    pub fn token(&self) -> Result<String, ConfigError> {
        self.api_token
            .clone()
            .ok_or_else(|| ConfigError::MissingField {
                field: "inference.api_token".to_string(),
            })
    }
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api-inference.huggingface.co".to_string(),
            api_token: None,
            personality_model: "Minej/bert-base-personality".to_string(),
            personality_labels: vec![
                "Extroversion".to_string(),
                "Neuroticism".to_string(),
                "Agreeableness".to_string(),
                "Conscientiousness".to_string(),
                "Openness".to_string(),
            ],
            emotion_model: "nateraw/bert-base-uncased-emotion".to_string(),
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            max_input_chars: 2000,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Remote,
    Local,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    /// Directory holding config.json, tokenizer.json and model.safetensors.
    pub model_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub database_url: String,
    pub top_k: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://persona_index.db?mode=rwc".to_string(),
            top_k: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info,reddit_persona=debug".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CoreError::Config(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }),
            ErrorKind::PermissionDenied => CoreError::Config(ConfigError::PermissionDenied {
                path: path.display().to_string(),
            }),
            _ => CoreError::Io(e),
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        let config: AppConfig = toml::from_str(content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or from `persona.toml` when present, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Fill credentials from `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`,
    /// `REDDIT_USER_AGENT` and `HF_TOKEN`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(client_id) = non_empty("REDDIT_CLIENT_ID") {
            self.reddit.client_id = Some(client_id);
        }
        if let Some(client_secret) = non_empty("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = Some(client_secret);
        }
        if let Some(user_agent) = non_empty("REDDIT_USER_AGENT") {
            self.reddit.user_agent = user_agent;
        }
        if let Some(token) = non_empty("HF_TOKEN") {
            self.inference.api_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.reddit.page_size) {
            return Err(ConfigError::InvalidValue {
                field: "reddit.page_size".to_string(),
                value: self.reddit.page_size.to_string(),
            });
        }
        if self.reddit.requests_per_minute == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reddit.requests_per_minute".to_string(),
                value: "0".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ConfigError::InvalidValue {
                field: "retry.jitter_factor".to_string(),
                value: self.retry.jitter_factor.to_string(),
            });
        }
        if self.index.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "index.top_k".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Client id and secret, required for any Reddit access.
    pub fn reddit_credentials(&self) -> Result<(String, String), ConfigError> {
        let client_id = self
            .reddit
            .client_id
            .clone()
            .ok_or_else(|| ConfigError::MissingField {
                field: "reddit.client_id".to_string(),
            })?;
        let client_secret =
            self.reddit
                .client_secret
                .clone()
                .ok_or_else(|| ConfigError::MissingField {
                    field: "reddit.client_secret".to_string(),
                })?;
        Ok((client_id, client_secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [reddit]
            client_id = "abc"
            page_size = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.reddit.client_id.as_deref(), Some("abc"));
        assert_eq!(config.reddit.page_size, 50);
        assert_eq!(config.reddit.requests_per_minute, 60);
        assert_eq!(config.collection.output_dir, PathBuf::from("exports"));
        assert_eq!(config.embedding.backend, EmbeddingBackend::Remote);
        assert_eq!(config.inference.personality_labels.len(), 5);
    }

    #[test]
    fn test_invalid_page_size_is_rejected() {
        let err = AppConfig::from_toml_str("[reddit]\npage_size = 500\n").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "reddit.page_size"
        ));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = AppConfig::from_toml_str("[reddit\n").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_environment_overrides_credentials() {
        let env: HashMap<&str, &str> = [
            ("REDDIT_CLIENT_ID", "env-id"),
            ("REDDIT_CLIENT_SECRET", "env-secret"),
            ("HF_TOKEN", "hf_123"),
            ("REDDIT_USER_AGENT", "   "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.reddit_credentials().unwrap(),
            ("env-id".to_string(), "env-secret".to_string())
        );
        assert_eq!(config.inference.token().unwrap(), "hf_123");
        assert!(config.reddit.user_agent.starts_with("reddit-persona/"));
    }

    #[test]
    fn test_missing_credentials() {
        let config = AppConfig::default();
        assert!(matches!(
            config.reddit_credentials(),
            Err(ConfigError::MissingField { ref field }) if field == "reddit.client_id"
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
