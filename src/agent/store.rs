use super::message::Message;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Mutex;

/// Durable conversation history, keyed by session id.
pub trait ConversationStore: Send + Sync {
    /// `None` when the session has never been saved.
    fn load<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<Message>>>> + Send + 'a>>;

    fn save<'a>(
        &'a self,
        session_id: &'a str,
        messages: &'a [Message],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

// ── In-memory ────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: Mutex<HashMap<String, Vec<Message>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl ConversationStore for InMemoryStore {
    fn load<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<Message>>>> + Send + 'a>> {
        Box::pin(async move {
            let sessions = self
                .sessions
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Ok(sessions.get(session_id).cloned())
        })
    }

    fn save<'a>(
        &'a self,
        session_id: &'a str,
        messages: &'a [Message],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.sessions
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(session_id.to_string(), messages.to_vec());
            Ok(())
        })
    }
}

// ── JSON files ───────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    session_id: String,
    saved_at: DateTime<Utc>,
    messages: Vec<Message>,
}

/// One pretty-printed JSON file per session under `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        anyhow::ensure!(valid, "invalid session id '{session_id}'");
        Ok(self.dir.join(format!("{session_id}.json")))
    }
}

impl ConversationStore for JsonFileStore {
    fn load<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<Message>>>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.session_path(session_id)?;
            let raw = match tokio::fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed reading session {}", path.display()));
                }
            };
            let file: SessionFile = serde_json::from_str(&raw)
                .with_context(|| format!("failed parsing session {}", path.display()))?;
            Ok(Some(file.messages))
        })
    }

    fn save<'a>(
        &'a self,
        session_id: &'a str,
        messages: &'a [Message],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.session_path(session_id)?;
            let file = SessionFile {
                session_id: session_id.to_string(),
                saved_at: Utc::now(),
                messages: messages.to_vec(),
            };
            let content = serde_json::to_string_pretty(&file)?;

            tokio::fs::create_dir_all(&self.dir)
                .await
                .with_context(|| format!("failed creating {}", self.dir.display()))?;
            let temp_path = path.with_extension("json.tmp");
            tokio::fs::write(&temp_path, content)
                .await
                .with_context(|| format!("failed writing {}", temp_path.display()))?;
            if let Err(rename_error) = tokio::fs::rename(&temp_path, &path).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(rename_error)
                    .with_context(|| format!("failed replacing session {}", path.display()));
            }
            tracing::debug!(session = session_id, messages = messages.len(), "session saved");
            Ok(())
        })
    }
}
