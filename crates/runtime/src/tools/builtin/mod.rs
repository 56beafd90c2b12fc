//! The assistant's built-in tool set.

mod calculator;
mod notes;
mod search;
mod time;
mod weather;

pub use calculator::{CalcError, Calculator, evaluate};
pub use notes::{CreateNote, GetNote, Note, NoteStore};
pub use search::{SearchHit, WebSearch};
pub use time::CurrentTime;
pub use weather::Weather;

use super::{RegistryError, ToolRegistry};
use crate::retry::RetryPolicy;
use std::sync::Arc;

/// Settings for the tools that talk to upstream services.
#[derive(Debug, Clone, Default)]
pub struct BuiltinConfig {
    pub openweathermap_api_key: Option<String>,
    pub retry: RetryPolicy,
}

impl ToolRegistry {
    /// Registry with every built-in tool. The note tools share `notes`.
    pub fn builtin(config: BuiltinConfig, notes: Arc<NoteStore>) -> Result<Self, RegistryError> {
        let client = reqwest::Client::new();
        ToolRegistry::new()
            .with(Calculator)?
            .with(WebSearch::new(client.clone(), config.retry))?
            .with(Weather::new(client, config.openweathermap_api_key, config.retry))?
            .with(CurrentTime)?
            .with(CreateNote::new(Arc::clone(&notes)))?
            .with(GetNote::new(notes))
    }
}

/// Upstream failure, split by whether a retry may help.
#[derive(Debug, thiserror::Error)]
pub(crate) enum FetchError {
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Permanent(String),
}

impl FetchError {
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// A reqwest failure with the request URL stripped, since query strings
    /// may carry API keys.
    pub(crate) fn request(context: &str, error: reqwest::Error) -> Self {
        Self::Permanent(format!("{context}: {}", error.without_url()))
    }
}
