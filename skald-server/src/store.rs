//! Roster/stats store
//!
//! A single structured record holding cumulative print counters, the admin
//! id, the last-registered user id and the user roster. Loaded once at
//! startup and rewritten wholesale to disk on every mutation. O(n) write
//! amplification per message is an intentional simplification: traffic is
//! human-paced, durability is what matters.
//!
//! The store object is injected into the components that need it and guards
//! its read-modify-write-persist cycle with a single-writer lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Kind of a printable message, used for per-kind statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Contact,
    Location,
    Poll,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Contact => "contact",
            MessageKind::Location => "location",
            MessageKind::Poll => "poll",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A known sender
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub permission_to_print: bool,
    pub anonymous: bool,
    /// Timestamp of the last accepted message (spam window anchor)
    pub last_message: DateTime<Utc>,
    /// Messages accepted within the current spam window, current included
    pub recent_messages: u32,
}

impl User {
    pub fn new(id: i64, name: &str, permission_to_print: bool) -> Self {
        Self {
            id,
            name: name.to_string(),
            permission_to_print,
            anonymous: false,
            last_message: DateTime::<Utc>::UNIX_EPOCH,
            recent_messages: 0,
        }
    }
}

/// Cumulative print counters, incremented only after a confirmed print
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total_prints: u64,
    pub text_prints: u64,
    pub image_prints: u64,
    pub contact_prints: u64,
    pub poll_prints: u64,
    pub location_prints: u64,
}

impl Stats {
    pub fn increment(&mut self, kind: MessageKind) {
        self.total_prints += 1;
        match kind {
            MessageKind::Text => self.text_prints += 1,
            MessageKind::Image => self.image_prints += 1,
            MessageKind::Contact => self.contact_prints += 1,
            MessageKind::Poll => self.poll_prints += 1,
            MessageKind::Location => self.location_prints += 1,
        }
    }
}

/// The persisted record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterData {
    #[serde(flatten)]
    pub stats: Stats,
    pub admin_id: i64,
    pub last_user_id: i64,
    pub users: Vec<User>,
}

impl RosterData {
    fn new(admin_id: i64) -> Self {
        Self {
            stats: Stats::default(),
            admin_id,
            last_user_id: 0,
            users: Vec::new(),
        }
    }
}

/// Roster/stats store with wholesale-rewrite persistence
pub struct RosterStore {
    path: PathBuf,
    data: RwLock<RosterData>,
}

impl RosterStore {
    /// Load the store from disk, or create it fresh for the given admin
    pub fn open(path: impl Into<PathBuf>, admin_id: i64) -> StoreResult<Self> {
        let path = path.into();
        let data = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "roster file not found, creating");
                let data = RosterData::new(admin_id);
                write_atomically(&path, &data)?;
                data
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Read a snapshot of the record
    pub fn read<R>(&self, f: impl FnOnce(&RosterData) -> R) -> StoreResult<R> {
        let guard = self.data.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&guard))
    }

    /// Mutate the record and persist it before returning
    pub fn mutate<R>(&self, f: impl FnOnce(&mut RosterData) -> R) -> StoreResult<R> {
        let mut guard = self.data.write().map_err(|_| StoreError::Poisoned)?;
        let result = f(&mut guard);
        write_atomically(&self.path, &guard)?;
        Ok(result)
    }

    /// Increment the counter for one completed physical print
    pub fn record_print(&self, kind: MessageKind) -> StoreResult<()> {
        self.mutate(|data| data.stats.increment(kind))
    }

    pub fn stats(&self) -> StoreResult<Stats> {
        self.read(|data| data.stats.clone())
    }

    pub fn admin_id(&self) -> StoreResult<i64> {
        self.read(|data| data.admin_id)
    }
}

fn write_atomically(path: &Path, data: &RosterData) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves.json");

        let store = RosterStore::open(&path, 42).unwrap();
        store
            .mutate(|d| d.users.push(User::new(7, "Grace Hopper", true)))
            .unwrap();
        store.record_print(MessageKind::Text).unwrap();
        drop(store);

        let reloaded = RosterStore::open(&path, 0).unwrap();
        assert_eq!(reloaded.admin_id().unwrap(), 42);
        let stats = reloaded.stats().unwrap();
        assert_eq!(stats.total_prints, 1);
        assert_eq!(stats.text_prints, 1);
        let users = reloaded.read(|d| d.users.clone()).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Grace Hopper");
    }

    #[test]
    fn test_stats_monotonic_per_kind() {
        let mut stats = Stats::default();
        stats.increment(MessageKind::Image);
        stats.increment(MessageKind::Image);
        stats.increment(MessageKind::Location);
        assert_eq!(stats.total_prints, 3);
        assert_eq!(stats.image_prints, 2);
        assert_eq!(stats.location_prints, 1);
        assert_eq!(stats.text_prints, 0);
    }
}
