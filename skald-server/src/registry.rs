//! User registry and spam gate
//!
//! Semantics over the roster store: registration, permission management,
//! anonymity, and the per-sender sliding spam window. The window check is
//! O(1) per user and needs no background sweeping; state self-heals the
//! moment a sender goes quiet for the window length.

use crate::error::Rejection;
use crate::store::{RosterStore, StoreError, User};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Sliding spam window length
const SPAM_WINDOW_MINUTES: i64 = 5;
/// Accepted messages allowed per window (current message included)
const SPAM_LIMIT: u32 = 5;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("User id not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Outcome of a registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOutcome {
    pub already_registered: bool,
}

/// Sender identity as resolved for printing
#[derive(Debug, Clone)]
pub struct ResolvedSender {
    /// Display name, with the anonymity preference already applied
    pub name: String,
    pub permission_to_print: bool,
}

/// User registry over the injected roster store
#[derive(Clone)]
pub struct UserRegistry {
    store: Arc<RosterStore>,
    default_permission: bool,
}

impl UserRegistry {
    pub fn new(store: Arc<RosterStore>, default_permission: bool) -> Self {
        Self {
            store,
            default_permission,
        }
    }

    /// Register a sender; idempotent.
    ///
    /// First call creates the user with the deployment default permission
    /// and records them as last-registered. Repeat calls resync the display
    /// name if it changed.
    pub fn register(&self, id: i64, display_name: &str) -> RegistryResult<RegisterOutcome> {
        let default_permission = self.default_permission;
        let outcome = self.store.mutate(|data| {
            if let Some(user) = data.users.iter_mut().find(|u| u.id == id) {
                if user.name != display_name {
                    user.name = display_name.to_string();
                }
                RegisterOutcome {
                    already_registered: true,
                }
            } else {
                data.users.push(User::new(id, display_name, default_permission));
                data.last_user_id = id;
                RegisterOutcome {
                    already_registered: false,
                }
            }
        })?;

        if !outcome.already_registered {
            info!(user_id = id, name = display_name, "registered new user");
        }
        Ok(outcome)
    }

    /// Look up a sender, resolving the printable name.
    ///
    /// Mostly a read, with one observable side effect: if the transport
    /// reports a changed display name, the stored name is resynced and the
    /// roster is persisted.
    pub fn lookup(&self, id: i64, display_name: &str) -> RegistryResult<Option<ResolvedSender>> {
        let changed = self.store.read(|data| {
            data.users
                .iter()
                .any(|u| u.id == id && u.name != display_name)
        })?;

        if changed {
            self.store.mutate(|data| {
                if let Some(user) = data.users.iter_mut().find(|u| u.id == id) {
                    user.name = display_name.to_string();
                }
            })?;
        }

        let resolved = self.store.read(|data| {
            data.users.iter().find(|u| u.id == id).map(|u| ResolvedSender {
                name: if u.anonymous {
                    "Anonymous".to_string()
                } else {
                    u.name.clone()
                },
                permission_to_print: u.permission_to_print,
            })
        })?;

        Ok(resolved)
    }

    /// Raw roster record for a sender
    pub fn get(&self, id: i64) -> RegistryResult<Option<User>> {
        Ok(self
            .store
            .read(|data| data.users.iter().find(|u| u.id == id).cloned())?)
    }

    /// All roster records, registration order
    pub fn list(&self) -> RegistryResult<Vec<User>> {
        Ok(self.store.read(|data| data.users.clone())?)
    }

    /// Grant or revoke printing permission. Returns the user's stored name.
    pub fn set_permission(&self, id: i64, granted: bool) -> RegistryResult<String> {
        let name = self.store.mutate(|data| {
            data.users.iter_mut().find(|u| u.id == id).map(|user| {
                user.permission_to_print = granted;
                user.name.clone()
            })
        })?;
        name.ok_or(RegistryError::NotFound)
    }

    /// Set the anonymity preference. Returns the new value.
    pub fn set_anonymous(&self, id: i64, anonymous: bool) -> RegistryResult<bool> {
        let updated = self.store.mutate(|data| {
            data.users.iter_mut().find(|u| u.id == id).map(|user| {
                user.anonymous = anonymous;
                user.anonymous
            })
        })?;
        updated.ok_or(RegistryError::NotFound)
    }

    /// Shared roster store, for the stats counters
    pub fn store(&self) -> &Arc<RosterStore> {
        &self.store
    }

    /// Single configured admin id, not a set
    pub fn is_admin(&self, id: i64) -> RegistryResult<bool> {
        Ok(self.store.read(|data| data.admin_id == id)?)
    }

    pub fn last_registered(&self) -> RegistryResult<i64> {
        Ok(self.store.read(|data| data.last_user_id)?)
    }

    /// Spam gate: sliding window per sender.
    ///
    /// Returns `None` when the message may proceed (the window state is
    /// updated and persisted), or the rejection to reply with. Unregistered
    /// senders are rejected rather than counted. A rejected message does not
    /// touch the window anchor, so throttling clears once the sender stays
    /// quiet for the window length.
    pub fn check_throttle(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> RegistryResult<Option<Rejection>> {
        let window = Duration::minutes(SPAM_WINDOW_MINUTES);

        let throttled = self.store.read(|data| {
            data.users.iter().find(|u| u.id == id).map(|u| {
                now.signed_duration_since(u.last_message) < window && u.recent_messages >= SPAM_LIMIT
            })
        })?;

        match throttled {
            None => Ok(Some(Rejection::Unregistered)),
            Some(true) => Ok(Some(Rejection::Throttled)),
            Some(false) => {
                self.store.mutate(|data| {
                    if let Some(user) = data.users.iter_mut().find(|u| u.id == id) {
                        if now.signed_duration_since(user.last_message) < window {
                            user.recent_messages += 1;
                        } else {
                            // New window: the current message is the first in it
                            user.recent_messages = 1;
                        }
                        user.last_message = now;
                    }
                })?;
                Ok(None)
            }
        }
    }
}
