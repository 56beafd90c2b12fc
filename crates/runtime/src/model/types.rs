use super::errors::ModelError;
use crate::tools::{ToolError, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
    ToolCall,
    ToolResult,
}

/// A tool invocation requested by the model.
///
/// Nothing in here is trusted: the name may not exist and the arguments may
/// be missing or mistyped. The executor is the validation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates this call with its result.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    /// Create a call with a freshly generated id.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// The four result classifications surfaced to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Success,
    ValidationError,
    ExecutionError,
    NotFound,
}

/// Outcome of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { output: Value },
    Failure { error: ToolError },
}

/// The result attached to history after a tool call, tagged with the
/// originating call id and tool name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub(crate) fn success(call: &ToolCall, output: Value) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            outcome: ToolOutcome::Success { output },
        }
    }

    pub(crate) fn failure(call: &ToolCall, error: ToolError) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            outcome: ToolOutcome::Failure { error },
        }
    }

    pub fn kind(&self) -> ResultKind {
        match &self.outcome {
            ToolOutcome::Success { .. } => ResultKind::Success,
            ToolOutcome::Failure { error } => error.kind(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind() != ResultKind::Success
    }
}

/// The body of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnContent {
    Text { text: String },
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text { text: text.into() },
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: TurnContent::Text { text: text.into() },
        }
    }

    pub(crate) fn tool_call(call: ToolCall) -> Self {
        Self {
            role: Role::ToolCall,
            content: TurnContent::ToolCall(call),
        }
    }

    pub(crate) fn tool_result(result: ToolResult) -> Self {
        Self {
            role: Role::ToolResult,
            content: TurnContent::ToolResult(result),
        }
    }

    /// Text of a user or model turn.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match &self.content {
            TurnContent::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match &self.content {
            TurnContent::ToolResult(result) => Some(result),
            _ => None,
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Everything needed for a model request.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub history: &'a [Turn],
    pub tools: &'a [ToolSpec],
}

/// What the model decided to do.
///
/// A model never returns tool results, only requests for them.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

/// The response from a model.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub reply: Reply,
    pub usage: Usage,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            reply: Reply::Text(text.into()),
            usage: Usage::default(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            reply: Reply::ToolCalls(calls),
            usage: Usage::default(),
        }
    }
}

/// Trait for language model gateways.
pub trait Backend: Send + Sync {
    fn call(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, ModelError>> + Send;
}
