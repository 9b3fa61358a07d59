//! Durable message queue
//!
//! Append-only log of normalized messages with a printed/unprinted flag.
//! Every mutation rewrites the whole log to stable storage before the caller
//! proceeds, so nothing is silently lost across process restarts. Entries
//! are never deleted; `printed` only ever flips to true.
//!
//! Recovery is explicit: on startup the log is loaded and any unprinted
//! entry waits for an operator-triggered replay, not an automatic one.

use crate::normalize::NormalizedMessage;
use crate::store::MessageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queued message not found: {0}")]
    NotFound(String),

    #[error("Queue lock poisoned")]
    Poisoned,
}

pub type QueueResult<T> = Result<T, QueueError>;

/// One persisted message, owned exclusively by the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Sender name as resolved at enqueue time; a later anonymity toggle
    /// does not rewrite history
    pub sender_name: String,
    pub kind: MessageKind,
    pub body: String,
    #[serde(default)]
    pub qr: Vec<String>,
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub caption: Option<String>,
    pub printed: bool,
}

impl QueuedMessage {
    pub fn new(timestamp: DateTime<Utc>, sender_name: &str, unit: NormalizedMessage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            sender_name: sender_name.to_string(),
            kind: unit.kind,
            body: unit.body,
            qr: unit.qr,
            image: unit.image,
            caption: unit.caption,
            printed: false,
        }
    }
}

/// Durable queue over a single JSON log file
pub struct MessageQueue {
    path: PathBuf,
    entries: Mutex<Vec<QueuedMessage>>,
}

impl MessageQueue {
    /// Load the log from disk, or start empty
    pub fn open(path: impl Into<PathBuf>) -> QueueResult<Self> {
        let path = path.into();
        let entries: Vec<QueuedMessage> = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "backlog file not found, starting empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let unprinted = entries.iter().filter(|m| !m.printed).count();
        if unprinted > 0 {
            info!(unprinted, "loaded backlog with unprinted messages");
        }

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Append a message; persisted before this returns
    pub fn enqueue(&self, msg: QueuedMessage) -> QueueResult<()> {
        let mut entries = self.entries.lock().map_err(|_| QueueError::Poisoned)?;
        entries.push(msg);
        persist(&self.path, &entries)
    }

    /// Flip one message to printed
    pub fn mark_printed(&self, id: &str) -> QueueResult<()> {
        let mut entries = self.entries.lock().map_err(|_| QueueError::Poisoned)?;
        let msg = entries
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        msg.printed = true;
        persist(&self.path, &entries)
    }

    /// Administrative bulk flush; idempotent
    pub fn mark_all_printed(&self) -> QueueResult<usize> {
        let mut entries = self.entries.lock().map_err(|_| QueueError::Poisoned)?;
        let mut flipped = 0;
        for msg in entries.iter_mut() {
            if !msg.printed {
                msg.printed = true;
                flipped += 1;
            }
        }
        persist(&self.path, &entries)?;
        Ok(flipped)
    }

    /// Snapshot of the backlog, enqueue order
    pub fn list_unprinted(&self) -> QueueResult<Vec<QueuedMessage>> {
        let entries = self.entries.lock().map_err(|_| QueueError::Poisoned)?;
        Ok(entries.iter().filter(|m| !m.printed).cloned().collect())
    }

    pub fn backlog_len(&self) -> QueueResult<usize> {
        let entries = self.entries.lock().map_err(|_| QueueError::Poisoned)?;
        Ok(entries.iter().filter(|m| !m.printed).count())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn persist(path: &Path, entries: &[QueuedMessage]) -> QueueResult<()> {
    let bytes = serde_json::to_vec_pretty(entries)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
