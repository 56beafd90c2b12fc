//! Test doubles shared by the unit tests.

use crate::model::{Backend, ModelError, ModelRequest, ModelResponse, Turn};
use crate::tools::{Arguments, ParamSpec, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Returns its `text` argument.
pub struct EchoTool {
    name: String,
}

impl EchoTool {
    pub fn named(name: &str) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(&self.name, "Echo text back")
            .param(ParamSpec::string("text", "Text to echo").optional())
    }

    async fn execute(&self, args: Arguments) -> Result<Value, ToolError> {
        Ok(json!(args.opt_str("text").unwrap_or_default()))
    }
}

/// Counts executions; requires a `value` argument.
pub struct CountingTool {
    name: String,
    calls: Arc<AtomicUsize>,
}

impl CountingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(&self.name, "Counts calls").param(ParamSpec::string("value", "Anything"))
    }

    async fn execute(&self, args: Arguments) -> Result<Value, ToolError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({ "value": args.str("value")?, "call": n }))
    }
}

/// Always fails with the given message.
pub struct FailingTool {
    name: String,
    message: String,
}

impl FailingTool {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(&self.name, "Always fails")
    }

    async fn execute(&self, _args: Arguments) -> Result<Value, ToolError> {
        Err(ToolError::Execution(self.message.clone()))
    }
}

pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("panics", "Panics")
    }

    async fn execute(&self, _args: Arguments) -> Result<Value, ToolError> {
        panic!("tool bug")
    }
}

/// Sleeps before answering with its own name.
pub struct SleepTool {
    name: String,
    delay: Duration,
    timeout: Duration,
}

impl SleepTool {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
            timeout: crate::tools::DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for SleepTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(&self.name, "Sleeps")
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(&self, _args: Arguments) -> Result<Value, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(json!(self.name))
    }
}

/// A backend that replays scripted responses and records every request.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<VecDeque<Result<ModelResponse, ModelError>>>>,
    fallback: Option<Arc<dyn Fn() -> ModelResponse + Send + Sync>>,
    requests: Arc<Mutex<Vec<Vec<Turn>>>>,
}

impl ScriptedBackend {
    pub fn new(script: impl IntoIterator<Item = Result<ModelResponse, ModelError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Once the script runs out, answer every call with `response()`.
    pub fn then_forever(
        mut self,
        response: impl Fn() -> ModelResponse + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Some(Arc::new(response));
        self
    }

    /// History snapshots seen by each call, in order.
    pub fn requests(&self) -> Vec<Vec<Turn>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Backend for ScriptedBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(request.history.to_vec());
        let next = self.script.lock().unwrap().pop_front();
        match (next, &self.fallback) {
            (Some(response), _) => response,
            (None, Some(fallback)) => Ok(fallback()),
            (None, None) => Err(ModelError::Malformed("script exhausted".into())),
        }
    }
}
