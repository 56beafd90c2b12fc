//! Tool trait.

use super::{Arguments, ToolError, ToolSpec};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Default per-call execution budget.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// A named capability the model may ask to invoke.
///
/// Implementations receive arguments that already passed validation against
/// [`Tool::spec`]. Any domain-specific retrying (upstream rate limits and the
/// like) belongs in the implementation; the executor calls each tool exactly
/// once per request.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static descriptor presented to the model.
    fn spec(&self) -> ToolSpec;

    /// How long a single call may run before it is abandoned.
    fn timeout(&self) -> Duration {
        DEFAULT_TOOL_TIMEOUT
    }

    async fn execute(&self, args: Arguments) -> Result<Value, ToolError>;
}
