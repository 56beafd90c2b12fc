use crate::model::ResultKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during tool execution.
///
/// All of these are recoverable: they are recorded in history so the model
/// can see them and adapt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ToolError {
    #[error("tool '{name}' not found; available tools: {}", list_or_none(.available))]
    NotFound {
        name: String,
        available: Vec<String>,
    },
    #[error("invalid parameter '{param}': {reason}")]
    Validation { param: String, reason: String },
    #[error("timeout after {0}ms")]
    Timeout(u64),
    #[error("execution failed: {0}")]
    Execution(String),
}

impl ToolError {
    pub fn validation(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Build an execution error from any message, keeping only its first
    /// line and capping its length so no backtrace reaches the model.
    pub fn execution(message: impl AsRef<str>) -> Self {
        Self::Execution(sanitize(message.as_ref()))
    }

    pub fn kind(&self) -> ResultKind {
        match self {
            Self::NotFound { .. } => ResultKind::NotFound,
            Self::Validation { .. } => ResultKind::ValidationError,
            Self::Timeout(_) | Self::Execution(_) => ResultKind::ExecutionError,
        }
    }
}

/// Errors raised while composing a registry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(String),
    #[error("invalid tool name: {0:?}")]
    InvalidName(String),
}

const MAX_MESSAGE_CHARS: usize = 300;

fn sanitize(message: &str) -> String {
    let line = message.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("unknown error");
    if line.chars().count() > MAX_MESSAGE_CHARS {
        let cut: String = line.chars().take(MAX_MESSAGE_CHARS).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
