//! Configuration loading from aide.toml.

use runtime::RetryPolicy;
use runtime::tools::BuiltinConfig;
use runtime::{DEFAULT_MAX_ITERATIONS, DEFAULT_MODEL, ExecutorConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "aide.toml";
const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
const OPENWEATHERMAP_API_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Model provider configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Provider name (currently only "gemini" supported).
    pub provider: String,

    pub model: String,

    /// Falls back to `$GEMINI_API_KEY`.
    pub api_key: Option<String>,

    /// Retries for rate limits and server errors.
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            max_retries: 3,
        }
    }
}

/// Request loop limits.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_iterations: usize,
    pub max_concurrent_tools: usize,
    /// Upper bound on any single tool execution.
    pub tool_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_concurrent_tools: 5,
            tool_timeout_secs: 30,
        }
    }
}

/// Credentials for tools backed by third-party services.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Falls back to `$OPENWEATHERMAP_API_KEY`.
    pub openweathermap_api_key: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.backend.provider != "gemini" {
            return Err(ConfigError::UnsupportedProvider(
                config.backend.provider.clone(),
            ));
        }
        Ok(config)
    }

    /// The Gemini API key from config or the environment.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.api_key_with(|name| std::env::var(name).ok())
    }

    fn api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
        self.backend
            .api_key
            .clone()
            .or_else(|| env(GEMINI_API_KEY_ENV))
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_retries(self.backend.max_retries)
    }

    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrent: self.session.max_concurrent_tools.max(1),
            max_timeout: Duration::from_secs(self.session.tool_timeout_secs.max(1)),
        }
    }

    pub fn builtin_tools(&self) -> BuiltinConfig {
        self.builtin_tools_with(|name| std::env::var(name).ok())
    }

    fn builtin_tools_with(&self, env: impl Fn(&str) -> Option<String>) -> BuiltinConfig {
        BuiltinConfig {
            openweathermap_api_key: self
                .tools
                .openweathermap_api_key
                .clone()
                .or_else(|| env(OPENWEATHERMAP_API_KEY_ENV))
                .filter(|key| !key.trim().is_empty()),
            retry: self.retry(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("API key not configured: set backend.api_key or $GEMINI_API_KEY")]
    MissingApiKey,

    #[error("unsupported provider '{0}' (supported: gemini)")]
    UnsupportedProvider(String),
}
