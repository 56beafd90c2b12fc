//! Append-only conversation history.

use crate::model::{ToolCall, Turn, TurnContent};
use std::collections::HashSet;

/// Ordered record of one conversation.
///
/// Only the session appends; callers get read-only views. The whole
/// sequence is what the model sees on every call, so nothing is ever
/// dropped or reordered short of an explicit [`reset`](Self::reset).
#[derive(Debug, Clone, Default)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Read-only view of every turn in order.
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    /// Forget everything and start a new conversation.
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Tool calls that have no result yet.
    pub fn pending_calls(&self) -> Vec<&ToolCall> {
        let answered: HashSet<&str> = self
            .turns
            .iter()
            .filter_map(|t| match &t.content {
                TurnContent::ToolResult(result) => Some(result.call_id.as_str()),
                _ => None,
            })
            .collect();

        self.turns
            .iter()
            .filter_map(Turn::as_tool_call)
            .filter(|call| !answered.contains(call.id.as_str()))
            .collect()
    }
}
