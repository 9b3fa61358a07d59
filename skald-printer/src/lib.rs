//! # skald-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building (text, QR codes, cut)
//! - Raster image encoding (GS v 0)
//! - Device transports (raw TCP port 9100)
//!
//! Business logic (WHAT to print) stays in application code: message
//! rendering, per-sender headers and the transaction/retry policy all live
//! in `skald-server`.
//!
//! ## Example
//!
//! ```ignore
//! use skald_printer::{EscPosBuilder, ReceiptDevice, TcpDevice};
//!
//! let mut builder = EscPosBuilder::new(48);
//! builder.center();
//! builder.line("Skald started!");
//! builder.qr_code("https://example.com", 8);
//! builder.cut();
//!
//! let device = TcpDevice::new("192.168.1.100", 9100)?;
//! let mut session = device.open().await?;
//! session.write(&builder.build()).await?;
//! session.close().await?;
//! ```

mod device;
mod error;
mod escpos;

// Re-exports
pub use device::{DeviceSession, ReceiptDevice, TcpDevice};
pub use error::{DeviceError, DeviceResult};
pub use escpos::EscPosBuilder;

#[cfg(feature = "image")]
pub use escpos::image_to_raster;
