//! Local filesystem session storage
//!
//! Snapshots are stored as pretty-printed JSON files, one per session, named
//! `<id>.json` under the configured session directory.

use crate::context::LogSnapshot;
use crate::error::{SeekerError, SeekerResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

/// Characters of the first user message shown in listings
const PREVIEW_CHARS: usize = 50;

/// Lightweight session info for listings
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Session identifier (file stem on disk)
    pub id: String,
    /// Model the conversation was held with
    pub model: String,
    /// When the snapshot was saved
    pub saved_at: DateTime<Utc>,
    /// Number of turns in the snapshot
    pub turn_count: usize,
    /// First user message, truncated
    pub preview: String,
}

/// Durable save/load of conversation snapshots
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a snapshot, returning its identifier
    async fn save(&self, snapshot: &LogSnapshot) -> SeekerResult<String>;

    /// Load a snapshot by identifier
    async fn load(&self, id: &str) -> SeekerResult<LogSnapshot>;

    /// List saved sessions, most recently saved first
    async fn list(&self) -> SeekerResult<Vec<SessionSummary>>;

    /// Delete a saved session
    async fn delete(&self, id: &str) -> SeekerResult<()>;
}

/// Filesystem-backed session store
pub struct LocalSessionStore {
    base_path: PathBuf,
}

impl LocalSessionStore {
    /// Create a store rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{id}.json"))
    }

    async fn ensure_dir(&self) -> SeekerResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    async fn read_snapshot(&self, path: &PathBuf) -> SeekerResult<LogSnapshot> {
        let content = fs::read_to_string(path).await?;
        let snapshot: LogSnapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }
}

#[async_trait]
impl SessionStore for LocalSessionStore {
    async fn save(&self, snapshot: &LogSnapshot) -> SeekerResult<String> {
        self.ensure_dir().await?;

        let path = self.session_path(&snapshot.id);
        let content = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, content).await?;

        debug!(id = %snapshot.id, path = %path.display(), "session saved");
        Ok(snapshot.id.clone())
    }

    async fn load(&self, id: &str) -> SeekerResult<LogSnapshot> {
        let path = self.session_path(id);
        if !path.exists() {
            return Err(SeekerError::session(format!("session not found: {id}")));
        }

        let snapshot = self.read_snapshot(&path).await?;
        debug!(id, turns = snapshot.turns.len(), "session loaded");
        Ok(snapshot)
    }

    async fn list(&self) -> SeekerResult<Vec<SessionSummary>> {
        self.ensure_dir().await?;

        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut sessions = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            match self.read_snapshot(&path).await {
                Ok(snapshot) => sessions.push(SessionSummary {
                    preview: snapshot.preview(PREVIEW_CHARS),
                    turn_count: snapshot.turns.len(),
                    id: snapshot.id,
                    model: snapshot.model,
                    saved_at: snapshot.saved_at,
                }),
                Err(e) => {
                    warn!(path = %path.display(), "skipping unreadable session file: {e}");
                }
            }
        }

        sessions.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(sessions)
    }

    async fn delete(&self, id: &str) -> SeekerResult<()> {
        let path = self.session_path(id);
        if !path.exists() {
            return Err(SeekerError::session(format!("session not found: {id}")));
        }
        fs::remove_file(&path).await?;
        debug!(id, "session deleted");
        Ok(())
    }
}
