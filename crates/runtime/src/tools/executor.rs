//! Tool executor with validation, timeout and concurrency control.

use super::{Arguments, ParamFormat, ParamKind, ParamSpec, ToolError, ToolRegistry, ToolSpec};
use crate::model::{ToolCall, ToolResult};
use futures::FutureExt;
use futures::stream::{FuturesUnordered, Stream};
use serde_json::{Map, Number, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Configuration for tool execution.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum tool executions in flight at once.
    pub max_concurrent: usize,
    /// Upper bound applied to every tool's own timeout.
    pub max_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_timeout: Duration::from_secs(300),
        }
    }
}

/// Turns untrusted tool calls into tool results.
///
/// Lookup and validation happen before anything runs, so an unknown tool or
/// a missing required argument never reaches an executable.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
    semaphore: Arc<Semaphore>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, config: ExecutorConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            registry,
            config,
            semaphore,
        }
    }

    pub fn with_defaults(registry: Arc<ToolRegistry>) -> Self {
        Self::new(registry, ExecutorConfig::default())
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a single call. Never fails: every outcome becomes a result.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let start = Instant::now();

        let Some(entry) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, call_id = %call.id, "model requested unknown tool");
            return ToolResult::failure(
                call,
                ToolError::NotFound {
                    name: call.name.clone(),
                    available: self.registry.names(),
                },
            );
        };

        let args = match validate(&entry.spec, &call.arguments) {
            Ok(args) => args,
            Err(error) => {
                debug!(tool = %call.name, call_id = %call.id, %error, "rejected tool arguments");
                return ToolResult::failure(call, error);
            }
        };

        let Ok(_permit) = self.semaphore.acquire().await else {
            return ToolResult::failure(call, ToolError::execution("executor shut down"));
        };

        let limit = entry.tool.timeout().min(self.config.max_timeout);
        debug!(tool = %call.name, call_id = %call.id, timeout_ms = limit.as_millis() as u64, "executing tool");

        let run = AssertUnwindSafe(entry.tool.execute(args)).catch_unwind();
        let result = match tokio::time::timeout(limit, run).await {
            Ok(Ok(Ok(output))) => ToolResult::success(call, output),
            Ok(Ok(Err(error))) => ToolResult::failure(call, normalize(error)),
            Ok(Err(_panic)) => {
                warn!(tool = %call.name, call_id = %call.id, "tool panicked");
                ToolResult::failure(call, ToolError::execution("tool panicked"))
            }
            Err(_) => {
                warn!(tool = %call.name, call_id = %call.id, timeout_ms = limit.as_millis() as u64, "tool timed out");
                ToolResult::failure(call, ToolError::Timeout(limit.as_millis() as u64))
            }
        };

        debug!(
            tool = %call.name,
            call_id = %call.id,
            kind = ?result.kind(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tool finished"
        );
        result
    }

    /// Execute independent calls concurrently, yielding results as they
    /// complete. Concurrency is bounded by `max_concurrent`.
    pub fn execute_batch<'a>(
        &'a self,
        calls: &'a [ToolCall],
    ) -> impl Stream<Item = ToolResult> + Send + 'a {
        calls
            .iter()
            .map(|call| self.execute(call))
            .collect::<FuturesUnordered<_>>()
    }
}

fn normalize(error: ToolError) -> ToolError {
    match error {
        ToolError::Execution(message) => ToolError::execution(message),
        other => other,
    }
}

/// Check `input` against `spec`, coercing values and applying defaults.
///
/// Unknown arguments are dropped rather than rejected.
pub fn validate(spec: &ToolSpec, input: &Value) -> Result<Arguments, ToolError> {
    let empty = Map::new();
    let provided = match input {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ToolError::validation(
                "arguments",
                format!("expected an object, got {}", type_name(other)),
            ));
        }
    };

    let mut validated = Map::new();
    for param in &spec.params {
        match provided.get(&param.name).filter(|v| !v.is_null()) {
            Some(value) => {
                validated.insert(param.name.clone(), coerce(param, value)?);
            }
            None => match &param.default {
                Some(default) => {
                    validated.insert(param.name.clone(), default.clone());
                }
                None if param.required => {
                    return Err(ToolError::validation(
                        &param.name,
                        "missing required parameter",
                    ));
                }
                None => {}
            },
        }
    }
    Ok(Arguments::new(validated))
}

fn coerce(param: &ParamSpec, value: &Value) -> Result<Value, ToolError> {
    let invalid = |expected: &str| {
        ToolError::validation(
            &param.name,
            format!("expected {expected}, got {}", type_name(value)),
        )
    };

    let coerced = match param.kind {
        ParamKind::String => match value {
            Value::String(_) => value.clone(),
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            _ => return Err(invalid("a string")),
        },
        ParamKind::Integer => match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Value::from(i),
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Value::from(f as i64)
                    }
                    _ => return Err(invalid("an integer")),
                },
            },
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(_) => return Err(invalid("an integer")),
            },
            _ => return Err(invalid("an integer")),
        },
        ParamKind::Number => match value {
            Value::Number(_) => value.clone(),
            Value::String(s) => match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
                Some(n) => Value::Number(n),
                None => return Err(invalid("a number")),
            },
            _ => return Err(invalid("a number")),
        },
        ParamKind::Boolean => match value {
            Value::Bool(_) => value.clone(),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => return Err(invalid("a boolean")),
        },
    };

    if let (Some(ParamFormat::IanaTimezone), Value::String(zone)) = (param.format, &coerced) {
        if zone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ToolError::validation(
                &param.name,
                format!("'{zone}' is not an IANA timezone name (for example America/New_York)"),
            ));
        }
    }

    Ok(coerced)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResultKind, ToolOutcome};
    use crate::testing::{CountingTool, EchoTool, FailingTool, PanickingTool, SleepTool};
    use futures::StreamExt;
    use serde_json::json;

    fn executor(registry: ToolRegistry) -> ToolExecutor {
        ToolExecutor::with_defaults(Arc::new(registry))
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found_and_nothing_runs() {
        let counter = CountingTool::new("counter");
        let calls = counter.calls();
        let exec = executor(ToolRegistry::new().with(counter).unwrap());

        let result = exec.execute(&ToolCall::new("rocket", json!({}))).await;

        assert_eq!(result.kind(), ResultKind::NotFound);
        assert_eq!(result.tool_name, "rocket");
        let ToolOutcome::Failure { error } = &result.outcome else {
            panic!("expected failure");
        };
        assert!(error.to_string().contains("counter"));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_required_parameter_never_executes() {
        let counter = CountingTool::new("counter");
        let calls = counter.calls();
        let exec = executor(ToolRegistry::new().with(counter).unwrap());

        let result = exec.execute(&ToolCall::new("counter", json!({}))).await;

        assert_eq!(result.kind(), ResultKind::ValidationError);
        assert_eq!(
            result.outcome,
            ToolOutcome::Failure {
                error: ToolError::validation("value", "missing required parameter")
            }
        );
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_call_executes_exactly_once() {
        let counter = CountingTool::new("counter");
        let calls = counter.calls();
        let exec = executor(ToolRegistry::new().with(counter).unwrap());

        let result = exec
            .execute(&ToolCall::new("counter", json!({"value": "7"})))
            .await;

        assert_eq!(result.kind(), ResultKind::Success);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tool_failures_become_sanitized_execution_errors() {
        let exec = executor(
            ToolRegistry::new()
                .with(FailingTool::new("flaky", "upstream refused\n  at client.rs:10"))
                .unwrap(),
        );
        let result = exec.execute(&ToolCall::new("flaky", json!({}))).await;
        assert_eq!(
            result.outcome,
            ToolOutcome::Failure {
                error: ToolError::Execution("upstream refused".into())
            }
        );
    }

    #[tokio::test]
    async fn panics_are_caught() {
        let exec = executor(ToolRegistry::new().with(PanickingTool).unwrap());
        let result = exec.execute(&ToolCall::new("panics", json!({}))).await;
        assert_eq!(result.kind(), ResultKind::ExecutionError);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let slow = SleepTool::new("slow", Duration::from_secs(60)).with_timeout(Duration::from_secs(1));
        let exec = executor(ToolRegistry::new().with(slow).unwrap());

        let result = exec.execute(&ToolCall::new("slow", json!({}))).await;

        assert_eq!(
            result.outcome,
            ToolOutcome::Failure {
                error: ToolError::Timeout(1000)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_does_not_block_siblings() {
        let registry = ToolRegistry::new()
            .with(SleepTool::new("slow", Duration::from_secs(60)).with_timeout(Duration::from_secs(2)))
            .and_then(|r| r.with(EchoTool::named("echo")))
            .unwrap();
        let exec = executor(registry);
        let calls = vec![
            ToolCall::new("slow", json!({})),
            ToolCall::new("echo", json!({"text": "hi"})),
        ];

        let results: Vec<ToolResult> = exec.execute_batch(&calls).collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_name, "echo");
        assert_eq!(results[0].kind(), ResultKind::Success);
        assert_eq!(results[1].tool_name, "slow");
        assert_eq!(results[1].kind(), ResultKind::ExecutionError);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_runs_concurrently_up_to_the_cap() {
        let registry = ToolRegistry::new()
            .with(SleepTool::new("a", Duration::from_secs(10)))
            .and_then(|r| r.with(SleepTool::new("b", Duration::from_secs(10))))
            .and_then(|r| r.with(SleepTool::new("c", Duration::from_secs(10))))
            .unwrap();
        let exec = ToolExecutor::new(
            Arc::new(registry),
            ExecutorConfig {
                max_concurrent: 2,
                ..ExecutorConfig::default()
            },
        );
        let calls: Vec<ToolCall> = ["a", "b", "c"]
            .into_iter()
            .map(|name| ToolCall::new(name, json!({})))
            .collect();

        let start = tokio::time::Instant::now();
        let results: Vec<ToolResult> = exec.execute_batch(&calls).collect().await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.is_error()));
        // two run together, the third waits for a permit
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(20), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(30), "{elapsed:?}");
    }

    #[test]
    fn coerces_numeric_strings_and_drops_unknown_arguments() {
        let spec = ToolSpec::new("search", "")
            .param(ParamSpec::string("query", ""))
            .param(ParamSpec::integer("num_results", "").with_default(5))
            .param(ParamSpec::boolean("safe", "").optional());

        let args = validate(
            &spec,
            &json!({"query": "rust", "num_results": "3", "safe": "TRUE", "bogus": 1}),
        )
        .unwrap();
        assert_eq!(args.str("query").unwrap(), "rust");
        assert_eq!(args.i64("num_results").unwrap(), 3);
        assert!(args.bool("safe").unwrap());
        assert!(args.get("bogus").is_none());

        let defaults = validate(&spec, &json!({"query": "rust", "num_results": null})).unwrap();
        assert_eq!(defaults.i64("num_results").unwrap(), 5);
        assert!(defaults.get("safe").is_none());
    }

    #[test]
    fn number_params_accept_integers_floats_and_numeric_strings() {
        let spec = ToolSpec::new("convert", "").param(ParamSpec::number("amount", ""));
        let schema = spec.json_schema();
        assert_eq!(schema["properties"]["amount"]["type"], "number");

        for (raw, expected) in [(json!(3), 3.0), (json!(2.5), 2.5), (json!(" 0.75 "), 0.75)] {
            let args = validate(&spec, &json!({ "amount": raw })).unwrap();
            assert_eq!(args.f64("amount").unwrap(), expected);
        }

        let err = validate(&spec, &json!({"amount": "lots"})).unwrap_err();
        assert!(matches!(err, ToolError::Validation { param, .. } if param == "amount"));
        let err = validate(&spec, &json!({"amount": "NaN"})).unwrap_err();
        assert!(matches!(err, ToolError::Validation { param, .. } if param == "amount"));
    }

    #[test]
    fn rejects_uncoercible_values() {
        let spec = ToolSpec::new("search", "").param(ParamSpec::integer("n", ""));
        let err = validate(&spec, &json!({"n": "many"})).unwrap_err();
        assert_eq!(err, ToolError::validation("n", "expected an integer, got string"));

        let err = validate(&spec, &json!({"n": 2.5})).unwrap_err();
        assert!(matches!(err, ToolError::Validation { param, .. } if param == "n"));

        let err = validate(&spec, &json!(["n"])).unwrap_err();
        assert!(matches!(err, ToolError::Validation { param, .. } if param == "arguments"));
    }

    #[test]
    fn timezone_format_is_enforced() {
        let spec = ToolSpec::new("get_current_time", "").param(
            ParamSpec::string("timezone", "")
                .with_default("UTC")
                .with_format(ParamFormat::IanaTimezone),
        );
        assert!(validate(&spec, &json!({"timezone": "Asia/Tokyo"})).is_ok());
        assert!(validate(&spec, &json!({})).is_ok());

        let err = validate(&spec, &json!({"timezone": "NYC"})).unwrap_err();
        assert!(matches!(err, ToolError::Validation { ref param, .. } if param == "timezone"));
        assert!(err.to_string().contains("NYC"));
    }
}
