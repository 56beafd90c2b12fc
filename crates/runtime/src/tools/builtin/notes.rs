//! Note taking backed by an injected in-memory store.

use crate::tools::{Arguments, ParamSpec, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

const PREVIEW_CHARS: usize = 100;

/// A saved note.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub content: String,
    pub created: DateTime<Utc>,
}

/// Notes keyed by title, in the order they were first saved.
///
/// Owned by whoever composes the registry and shared by the note tools.
#[derive(Debug, Default)]
pub struct NoteStore {
    notes: RwLock<IndexMap<String, Note>>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save a note, replacing any note with the same title. Returns the
    /// number of notes now stored.
    pub async fn save(&self, title: impl Into<String>, content: impl Into<String>) -> usize {
        let mut notes = self.notes.write().await;
        notes.insert(
            title.into(),
            Note {
                content: content.into(),
                created: Utc::now(),
            },
        );
        notes.len()
    }

    pub async fn get(&self, title: &str) -> Option<Note> {
        self.notes.read().await.get(title).cloned()
    }

    pub async fn titles(&self) -> Vec<String> {
        self.notes.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notes.read().await.is_empty()
    }
}

pub struct CreateNote {
    store: Arc<NoteStore>,
}

impl CreateNote {
    pub fn new(store: Arc<NoteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CreateNote {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "create_note",
            "Create and save a note with a title and content. Useful for reminders, to-do \
             items, or storing information.",
        )
        .param(ParamSpec::string("title", "The title or name of the note."))
        .param(ParamSpec::string("content", "The content or body of the note."))
    }

    async fn execute(&self, args: Arguments) -> Result<Value, ToolError> {
        let title = args.str("title")?.trim();
        if title.is_empty() {
            return Err(ToolError::validation("title", "must not be empty"));
        }
        let content = args.str("content")?;
        let total = self.store.save(title, content).await;

        let preview: String = content.chars().take(PREVIEW_CHARS).collect();
        let ellipsis = if content.chars().count() > PREVIEW_CHARS { "..." } else { "" };
        Ok(Value::String(format!(
            "Note created successfully!\n- Title: {title}\n- Content: {preview}{ellipsis}\n- Total notes saved: {total}"
        )))
    }
}

pub struct GetNote {
    store: Arc<NoteStore>,
}

impl GetNote {
    pub fn new(store: Arc<NoteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetNote {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("get_note", "Retrieve a previously saved note by its title.")
            .param(ParamSpec::string("title", "The title of the note to retrieve."))
    }

    async fn execute(&self, args: Arguments) -> Result<Value, ToolError> {
        let title = args.str("title")?.trim();
        match self.store.get(title).await {
            Some(note) => Ok(Value::String(format!(
                "Note: {title}\nContent: {}\nCreated: {}",
                note.content,
                note.created.format("%Y-%m-%d %H:%M:%S UTC")
            ))),
            None => {
                let titles = self.store.titles().await;
                let available = if titles.is_empty() {
                    "none".to_string()
                } else {
                    titles.join(", ")
                };
                Err(ToolError::execution(format!(
                    "note '{title}' not found; available notes: {available}"
                )))
            }
        }
    }
}
