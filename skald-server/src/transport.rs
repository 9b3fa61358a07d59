//! Chat transport seam
//!
//! The relay core never talks to a chat service directly; it goes through
//! this trait. The production implementation is the Telegram adapter, tests
//! plug in an in-memory fake.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Transport error: {0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a reply to a sender
    async fn reply(&self, recipient: i64, text: &str) -> Result<(), TransportError>;

    /// Out-of-band notification to the admin
    async fn notify(&self, admin: i64, text: &str) -> Result<(), TransportError> {
        self.reply(admin, text).await
    }

    /// Fetch the bytes behind an attachment reference
    async fn fetch_attachment(&self, reference: &str) -> Result<Vec<u8>, TransportError>;
}
