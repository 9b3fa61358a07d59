//! Skald Server - chat-to-receipt-printer relay
//!
//! # Architecture
//!
//! Messages arrive from a chat service, pass a registration and spam gate,
//! are normalized into printable units, persisted to a durable backlog, and
//! printed as one atomic transaction per message on a networked ESC/POS
//! receipt printer.
//!
//! # Module structure
//!
//! ```text
//! skald-server/src/
//! ├── config.rs      # Environment config + secret files
//! ├── store.rs       # Roster persistence (users, stats)
//! ├── registry.rs    # Registration, permissions, spam gate
//! ├── normalize/     # Text folding, URL extraction, image spooling
//! ├── queue.rs       # Durable message backlog
//! ├── printing/      # Print transaction engine + backlog indicator
//! ├── relay.rs       # Pipeline orchestration and commands
//! ├── transport.rs   # Chat transport seam
//! └── telegram.rs    # Telegram Bot API adapter
//! ```

pub mod config;
pub mod error;
pub mod logger;
pub mod normalize;
pub mod printing;
pub mod queue;
pub mod registry;
pub mod relay;
pub mod store;
pub mod telegram;
pub mod transport;

pub use config::{Config, ConfigError, Secrets};
pub use error::{Rejection, RelayError, RelayResult};
pub use logger::{init_logger, init_logger_with_file};
pub use normalize::{InboundContent, NormalizedMessage, Normalizer};
pub use printing::{BacklogIndicator, PrintEngine, PrintFailure};
pub use queue::{MessageQueue, QueuedMessage};
pub use registry::UserRegistry;
pub use relay::{Command, MessageRelay, SenderProfile};
pub use store::{MessageKind, RosterStore, Stats, User};
pub use telegram::{TelegramPoller, TelegramTransport};
pub use transport::{ChatTransport, TransportError};
