//! Language model providers.
//!
//! Each provider implements [`Backend`](crate::model::Backend) for its API.

mod gemini;

pub use gemini::{DEFAULT_MODEL, GeminiBackend, GeminiBackendBuilder};
