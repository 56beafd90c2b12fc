//! The request loop that drives a conversation.
//!
//! A request moves through `AwaitingModel → ExecutingTools → AwaitingModel →
//! … → Done`. The model proposes tool calls, the executor runs them and every
//! call and result lands in history before the model is asked again.

use crate::history::History;
use crate::model::{Backend, ModelError, ModelRequest, Reply, ToolCall, ToolResult, Turn};
use crate::tools::{ToolError, ToolExecutor};
use crate::{Error, Result};
use futures::StreamExt;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Answer returned when the model asks for another tool round after the
/// last allowed one. Those calls are neither recorded nor run.
pub const FALLBACK_ANSWER: &str = "I wasn't able to finish this request within the allowed \
    number of steps. Please try rephrasing it or breaking it into smaller questions.";

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The model answered in plain text.
    Answered,
    /// The iteration budget ran out while the model was still calling tools.
    IterationLimit,
}

/// The outcome of one user request.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub answer: String,
    /// History as it stood when the request finished.
    pub history: Vec<Turn>,
    /// Tool rounds performed for this request.
    pub iterations: usize,
    pub completion: Completion,
}

enum State {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done(String, Completion),
}

/// A conversation with one model and one tool set.
pub struct Session<B> {
    id: SessionId,
    backend: B,
    executor: ToolExecutor,
    history: History,
    max_iterations: usize,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B, executor: ToolExecutor) -> Self {
        Self {
            id: SessionId::new(),
            backend,
            executor,
            history: History::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Bound the number of tool rounds per request. Every round that runs is
    /// followed by another model call. Zero is treated as one.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Start a new conversation.
    pub fn reset(&mut self) {
        info!(session = %self.id, turns = self.history.len(), "resetting history");
        self.history.reset();
    }

    /// Run one user request to completion.
    pub async fn handle_request(&mut self, user_text: &str) -> Result<Exchange> {
        self.handle_request_with_cancel(user_text, &CancellationToken::new())
            .await
    }

    /// Like [`handle_request`](Self::handle_request), but stops early when
    /// `cancel` fires. Calls already in history are closed with a
    /// "cancelled" error result before returning [`Error::Cancelled`].
    pub async fn handle_request_with_cancel(
        &mut self,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<Exchange> {
        let span = info_span!("session", id = %self.id, iteration = tracing::field::Empty);
        self.run(user_text, cancel).instrument(span).await
    }

    async fn run(&mut self, user_text: &str, cancel: &CancellationToken) -> Result<Exchange> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.history.append(Turn::user(user_text));
        let mut iterations = 0;
        let mut state = State::AwaitingModel;

        loop {
            Span::current().record("iteration", iterations);
            state = match state {
                State::AwaitingModel => {
                    let request = ModelRequest {
                        history: self.history.snapshot(),
                        tools: self.executor.registry().list_schemas(),
                    };
                    debug!(turns = request.history.len(), "awaiting model");

                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        response = self.backend.call(request) => Some(response),
                    };
                    let Some(response) = outcome else {
                        return Err(self.abort());
                    };

                    match response?.reply {
                        Reply::Text(answer) => {
                            self.history.append(Turn::model(answer.clone()));
                            State::Done(answer, Completion::Answered)
                        }
                        Reply::ToolCalls(calls) if calls.is_empty() => {
                            return Err(Error::Gateway(ModelError::Malformed(
                                "model returned an empty tool call list".into(),
                            )));
                        }
                        Reply::ToolCalls(calls) if iterations >= self.max_iterations => {
                            warn!(
                                iterations,
                                dropped_calls = calls.len(),
                                "iteration limit reached"
                            );
                            State::Done(FALLBACK_ANSWER.to_string(), Completion::IterationLimit)
                        }
                        Reply::ToolCalls(calls) => {
                            for call in &calls {
                                self.history.append(Turn::tool_call(call.clone()));
                            }
                            State::ExecutingTools(calls)
                        }
                    }
                }

                State::ExecutingTools(calls) => {
                    info!(calls = calls.len(), "executing tool calls");
                    let cancelled = {
                        let results = self.executor.execute_batch(&calls);
                        tokio::pin!(results);
                        loop {
                            let next = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => None,
                                next = results.next() => Some(next),
                            };
                            match next {
                                None => break true,
                                Some(Some(result)) => {
                                    self.history.append(Turn::tool_result(result));
                                }
                                Some(None) => break false,
                            }
                        }
                    };
                    if cancelled {
                        return Err(self.abort());
                    }

                    iterations += 1;
                    State::AwaitingModel
                }

                State::Done(answer, completion) => {
                    info!(iterations, ?completion, "request complete");
                    return Ok(Exchange {
                        answer,
                        history: self.history.snapshot().to_vec(),
                        iterations,
                        completion,
                    });
                }
            };
        }
    }

    /// Close every unanswered call so history stays well paired.
    fn abort(&mut self) -> Error {
        let pending: Vec<ToolCall> = self.history.pending_calls().into_iter().cloned().collect();
        warn!(pending = pending.len(), "request cancelled");
        for call in &pending {
            self.history.append(Turn::tool_result(ToolResult::failure(
                call,
                ToolError::execution("cancelled"),
            )));
        }
        Error::Cancelled
    }
}
