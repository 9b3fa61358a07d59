//! Relay-level error types
//!
//! Two families live here:
//! - [`Rejection`] - user-visible refusals of an inbound message. Each
//!   rejection produces exactly one reply to the sender and is never
//!   retried. The `Display` text is the reply.
//! - [`RelayError`] - internal failures (store, queue, transport) that
//!   bubble up to the caller instead of reaching the sender.

use crate::printing::PrintFailure;
use crate::queue::QueueError;
use crate::registry::RegistryError;
use crate::store::StoreError;
use crate::transport::TransportError;
use thiserror::Error;

/// Why an inbound message was refused before reaching the printer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Sender has never run the onboarding command
    #[error("Please use the /start command before sending anything.")]
    Unregistered,

    /// Sender exceeded the spam window; self-clears once they go quiet
    #[error("Please wait a few minutes before sending another message.")]
    Throttled,

    /// Registered, but printing permission was revoked
    #[error("You do not have permission to print anymore.")]
    Forbidden,

    /// Content kind deliberately unsupported (permanent)
    #[error("{0}")]
    Unprintable(String),
}

/// Internal relay failures
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Print(#[from] PrintFailure),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Spool error: {0}")]
    Spool(#[from] std::io::Error),
}

impl From<TransportError> for RelayError {
    fn from(err: TransportError) -> Self {
        RelayError::Transport(err.0)
    }
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
