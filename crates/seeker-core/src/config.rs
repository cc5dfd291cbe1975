//! Client configuration
//!
//! Configuration is loaded once at startup and threaded into the core as
//! explicit values. Nothing in the core reads ambient state, so independent
//! sessions with different budgets can coexist in one process.

use crate::error::{SeekerError, SeekerResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "PPLX_API_KEY";

/// Default system prompt, matching a search-focused assistant
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant with real-time search capabilities.";

fn default_model() -> String {
    crate::llm::DEFAULT_MODEL.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_input_token_limit() -> usize {
    3000
}

fn default_output_token_limit() -> usize {
    1000
}

/// Token ceilings governing one conversation, immutable for the session
///
/// `input_token_limit` bounds the context sent with each request;
/// `output_token_limit` bounds the requested completion (and the size of
/// summarization calls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    /// Maximum estimated tokens across the log before a send is issued
    pub input_token_limit: usize,
    /// Maximum tokens requested for a completion
    pub output_token_limit: usize,
}

impl ContextBudget {
    /// Create a budget, rejecting zero limits
    pub fn new(input_token_limit: usize, output_token_limit: usize) -> SeekerResult<Self> {
        if input_token_limit == 0 || output_token_limit == 0 {
            return Err(SeekerError::config(
                "token limits must be greater than zero",
            ));
        }
        Ok(Self {
            input_token_limit,
            output_token_limit,
        })
    }

    /// Ceiling for a single summarization span (half the input limit)
    pub fn summary_span_limit(&self) -> usize {
        self.input_token_limit / 2
    }
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            input_token_limit: default_input_token_limit(),
            output_token_limit: default_output_token_limit(),
        }
    }
}

/// Top-level client configuration
///
/// Every field is optional in the config file; missing fields take the
/// defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekerConfig {
    /// Model to query
    pub model: String,

    /// System prompt seeded as the leading turn of every conversation
    pub system_prompt: String,

    /// Maximum estimated tokens of context per request
    pub input_token_limit: usize,

    /// Maximum tokens requested per completion
    pub output_token_limit: usize,

    /// Save the session automatically on exit
    pub auto_save: bool,

    /// Directory for saved sessions
    pub session_dir: PathBuf,

    /// API key; the `PPLX_API_KEY` environment variable takes precedence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for SeekerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            system_prompt: default_system_prompt(),
            input_token_limit: default_input_token_limit(),
            output_token_limit: default_output_token_limit(),
            auto_save: false,
            session_dir: default_base_dir().join("sessions"),
            api_key: None,
        }
    }
}

/// Base directory for configuration and sessions (`~/.seeker`)
pub fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".seeker")
}

/// Default configuration file path (`~/.seeker/config.toml`)
pub fn default_config_path() -> PathBuf {
    default_base_dir().join("config.toml")
}

impl SeekerConfig {
    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist
    pub fn load(path: &Path) -> SeekerResult<Self> {
        if !path.exists() {
            tracing::debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| SeekerError::Io {
            message: e.to_string(),
            path: Some(path.display().to_string()),
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| SeekerError::config(format!("invalid config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to a TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> SeekerResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SeekerError::config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate limits
    pub fn validate(&self) -> SeekerResult<()> {
        ContextBudget::new(self.input_token_limit, self.output_token_limit)?;
        Ok(())
    }

    /// The token budget derived from this configuration
    pub fn budget(&self) -> ContextBudget {
        ContextBudget {
            input_token_limit: self.input_token_limit,
            output_token_limit: self.output_token_limit,
        }
    }

    /// Resolve the API key: environment first, then config file
    pub fn resolve_api_key(&self) -> SeekerResult<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                return Ok(key);
            }
        }
        self.api_key.clone().filter(|k| !k.is_empty()).ok_or_else(|| {
            SeekerError::config(format!(
                "API key not found; set {API_KEY_ENV} or add api_key to the config file"
            ))
        })
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the session directory
    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SeekerConfig::default();
        assert_eq!(config.model, "sonar-pro");
        assert_eq!(config.input_token_limit, 3000);
        assert_eq!(config.output_token_limit, 1000);
        assert!(!config.auto_save);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_budget_rejects_zero_limits() {
        assert!(ContextBudget::new(0, 1000).is_err());
        assert!(ContextBudget::new(3000, 0).is_err());
        assert!(ContextBudget::new(3000, 1000).is_ok());
    }

    #[test]
    fn test_summary_span_limit_is_half_input() {
        let budget = ContextBudget::new(3000, 1000).unwrap();
        assert_eq!(budget.summary_span_limit(), 1500);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = SeekerConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model, SeekerConfig::default().model);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = \"sonar\"\ninput_token_limit = 50\n").unwrap();

        let config = SeekerConfig::load(&path).unwrap();
        assert_eq!(config.model, "sonar");
        assert_eq!(config.input_token_limit, 50);
        assert_eq!(config.output_token_limit, 1000);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = SeekerConfig::default().with_model("sonar-reasoning");
        config.save(&path).unwrap();

        let loaded = SeekerConfig::load(&path).unwrap();
        assert_eq!(loaded.model, "sonar-reasoning");
    }
}
