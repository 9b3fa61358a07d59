//! Printer transaction engine
//!
//! One `print` call is one transaction against the device:
//! open, header, body, optional caption, cut, close. The device is an
//! exclusive resource; an internal lock serializes transactions. The device
//! is closed on every exit path, and a failure at any emission step aborts
//! the remaining steps and reports the stage it died at. Only a clean run
//! through the cut advances the message to printed.

use crate::queue::QueuedMessage;
use skald_printer::{DeviceError, DeviceSession, EscPosBuilder, ReceiptDevice, image_to_raster};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Where in the transaction a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStage {
    Open,
    Header,
    Body,
    Caption,
    Cut,
    Close,
}

#[derive(Debug, Error)]
pub enum PrintFailure {
    /// Device rejected or dropped the transaction at a specific stage
    #[error("print failed at {stage:?}: {source}")]
    Device {
        stage: PrintStage,
        #[source]
        source: DeviceError,
    },

    /// Spooled image could not be read back for rastering
    #[error("spooled image {path} unreadable: {reason}")]
    Spool { path: String, reason: String },
}

fn stage_err(stage: PrintStage) -> impl FnOnce(DeviceError) -> PrintFailure {
    move |source| PrintFailure::Device { stage, source }
}

/// Engine driving one transaction at a time against the receipt device
pub struct PrintEngine {
    device: Arc<dyn ReceiptDevice>,
    /// Serializes transactions; the device is a single exclusive resource
    lock: Mutex<()>,
    width: usize,
    settle: Duration,
}

impl PrintEngine {
    pub fn new(device: Arc<dyn ReceiptDevice>, width: usize) -> Self {
        Self {
            device,
            lock: Mutex::new(()),
            width,
            // The device corrupts output when writes follow a raster
            // immediately; give the head time to catch up.
            settle: Duration::from_secs(1),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Print one queued message as a full transaction
    pub async fn print(&self, msg: &QueuedMessage) -> Result<(), PrintFailure> {
        // Raster data is prepared before the device opens so a bad spool
        // file never wedges an open session.
        let raster = match &msg.image {
            Some(path) => Some(self.load_raster(path)?),
            None => None,
        };

        let _guard = self.lock.lock().await;

        let mut session = self.device.open().await.map_err(stage_err(PrintStage::Open))?;
        let emitted = self.emit(session.as_mut(), msg, raster.as_deref()).await;
        let closed = session.close().await;

        emitted?;
        closed.map_err(stage_err(PrintStage::Close))?;

        info!(id = %msg.id, kind = %msg.kind, "printed message");
        Ok(())
    }

    async fn emit(
        &self,
        session: &mut dyn DeviceSession,
        msg: &QueuedMessage,
        raster: Option<&[u8]>,
    ) -> Result<(), PrintFailure> {
        // Header: timestamp and resolved sender name
        let mut header = EscPosBuilder::new(self.width);
        header.center();
        header.line(&format!(
            "{} - {}:",
            msg.timestamp.format("%Y-%m-%d %H:%M:%S"),
            msg.sender_name
        ));
        session
            .write(&header.build())
            .await
            .map_err(stage_err(PrintStage::Header))?;

        // Body text
        if !msg.body.is_empty() {
            let mut body = EscPosBuilder::new(self.width);
            body.line(&msg.body);
            session
                .write(&body.build())
                .await
                .map_err(stage_err(PrintStage::Body))?;
        }

        // Image raster, then the mandatory settle pause before any further
        // write on this session
        if let Some(data) = raster {
            session
                .write(data)
                .await
                .map_err(stage_err(PrintStage::Body))?;
            tokio::time::sleep(self.settle).await;
            session
                .write(b"\n")
                .await
                .map_err(stage_err(PrintStage::Body))?;
        }

        // QR blocks, each preceded by the payload in plain text
        for payload in &msg.qr {
            let mut qr = EscPosBuilder::new(self.width);
            qr.newline();
            qr.line(payload);
            qr.qr_code(payload, 8);
            session
                .write(&qr.build())
                .await
                .map_err(stage_err(PrintStage::Body))?;
        }

        // Trailing caption
        if let Some(caption) = &msg.caption {
            let mut cap = EscPosBuilder::new(self.width);
            cap.line(caption);
            session
                .write(&cap.build())
                .await
                .map_err(stage_err(PrintStage::Caption))?;
        }

        // Cut; completion past this point is what flips `printed`
        let mut cut = EscPosBuilder::new(self.width);
        cut.cut_feed(3);
        session
            .write(&cut.build())
            .await
            .map_err(stage_err(PrintStage::Cut))?;

        Ok(())
    }

    fn load_raster(&self, path: &std::path::Path) -> Result<Vec<u8>, PrintFailure> {
        let img = image::open(path).map_err(|e| PrintFailure::Spool {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(image_to_raster(&img, crate::normalize::IMAGE_WIDTH))
    }

    /// Print a short banner ticket (startup smoke test)
    pub async fn print_banner(&self, text: &str) -> Result<(), PrintFailure> {
        let _guard = self.lock.lock().await;

        let mut session = self.device.open().await.map_err(stage_err(PrintStage::Open))?;
        let mut b = EscPosBuilder::new(self.width);
        b.center();
        b.line(text);
        b.cut_feed(3);
        let emitted = session
            .write(&b.build())
            .await
            .map_err(stage_err(PrintStage::Body));
        let closed = session.close().await;

        emitted?;
        closed.map_err(stage_err(PrintStage::Close))?;
        Ok(())
    }

    /// One attention pulse on the device connector
    ///
    /// Goes through the same exclusivity lock so the indicator never
    /// interleaves with a print transaction.
    pub async fn pulse(&self) -> Result<(), PrintFailure> {
        let _guard = self.lock.lock().await;

        let mut session = match self.device.open().await {
            Ok(s) => s,
            Err(e) => {
                // An offline device just means no blink this cycle
                warn!(error = %e, "indicator pulse skipped");
                return Err(PrintFailure::Device {
                    stage: PrintStage::Open,
                    source: e,
                });
            }
        };
        let mut b = EscPosBuilder::new(self.width);
        b.pulse();
        let emitted = session
            .write(&b.build())
            .await
            .map_err(stage_err(PrintStage::Body));
        let closed = session.close().await;

        emitted?;
        closed.map_err(stage_err(PrintStage::Close))?;
        Ok(())
    }
}
