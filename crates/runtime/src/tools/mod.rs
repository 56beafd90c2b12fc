//! Tool registry, validation and execution.

pub mod builtin;
pub mod errors;
pub mod executor;
mod registry;
mod tool;
pub mod types;

pub use builtin::{BuiltinConfig, NoteStore};
pub use errors::{RegistryError, ToolError};
pub use executor::{ExecutorConfig, ToolExecutor};
pub use registry::{RegisteredTool, ToolRegistry};
pub use tool::{DEFAULT_TOOL_TIMEOUT, Tool};
pub use types::{Arguments, ParamFormat, ParamKind, ParamSpec, ToolSpec};
