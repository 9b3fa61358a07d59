//! Printer-facing side of the relay: the per-message transaction engine and
//! the backlog attention indicator.

mod engine;
mod indicator;

pub use engine::{PrintEngine, PrintFailure, PrintStage};
pub use indicator::BacklogIndicator;
