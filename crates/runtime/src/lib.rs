//! Aide runtime: a tool-calling assistant loop.
//!
//! A [`Session`] forwards the user's request to a language model together
//! with the schemas of every registered tool. When the model asks for tools,
//! the [`ToolExecutor`] validates and runs them, the results go into
//! [`History`], and the model is asked again until it answers in plain text
//! or the iteration budget runs out.
//!
//! # Overview
//!
//! - **Backend**: the model gateway trait ([`GeminiBackend`] talks to Gemini).
//! - **ToolRegistry**: tools known at startup, each with a parameter schema.
//! - **ToolExecutor**: lookup, validation, timeout and concurrency control.
//! - **History**: the append-only turn log the model sees on every call.
//! - **Session**: the bounded request loop tying the pieces together.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{GeminiBackend, NoteStore, Session, ToolExecutor, ToolRegistry};
//! use runtime::tools::BuiltinConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = GeminiBackend::builder("api-key", "gemini-2.5-flash").build();
//! let registry = ToolRegistry::builtin(BuiltinConfig::default(), Arc::new(NoteStore::new()))?;
//! let mut session = Session::new(backend, ToolExecutor::with_defaults(Arc::new(registry)));
//!
//! let exchange = session.handle_request("What's 25 * 4?").await?;
//! println!("{}", exchange.answer);
//! # Ok(())
//! # }
//! ```

mod error;
mod history;
pub mod model;
mod providers;
pub mod retry;
mod session;
pub mod tools;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use history::History;
pub use model::{
    Backend, ModelError, ModelRequest, ModelResponse, Reply, ResultKind, Role, ToolCall,
    ToolOutcome, ToolResult, Turn, TurnContent, Usage,
};
pub use providers::{DEFAULT_MODEL, GeminiBackend, GeminiBackendBuilder};
pub use retry::RetryPolicy;
pub use session::{
    Completion, DEFAULT_MAX_ITERATIONS, Exchange, FALLBACK_ANSWER, Session, SessionId,
};
pub use tools::{
    ExecutorConfig, NoteStore, Tool, ToolError, ToolExecutor, ToolRegistry, ToolSpec,
};
