//! Conversation types and the model gateway trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Backend, ModelRequest, ModelResponse, Reply, ResultKind, Role, ToolCall, ToolOutcome,
    ToolResult, Turn, TurnContent, Usage,
};
