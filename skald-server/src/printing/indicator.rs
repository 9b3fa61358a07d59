//! Backlog attention indicator
//!
//! While unprinted messages sit in the backlog, a repeating task pulses the
//! device connector (wired to an attention lamp). The task owns a
//! cancellation token and checks it at every cycle boundary, so a stop
//! request issued mid-cycle takes effect within one cycle.

use super::PrintEngine;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct BacklogIndicator {
    engine: Arc<PrintEngine>,
    interval: Duration,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl BacklogIndicator {
    pub fn new(engine: Arc<PrintEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            running: Mutex::new(None),
        }
    }

    /// Start blinking; no-op if already running
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((_, handle)) = running.as_ref()
            && !handle.is_finished()
        {
            return;
        }

        info!("backlog indicator started");
        let token = CancellationToken::new();
        let task_token = token.clone();
        let engine = self.engine.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        info!("backlog indicator stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = engine.pulse().await {
                            debug!(error = %e, "indicator pulse failed");
                        }
                    }
                }
            }
        });

        *running = Some((token, handle));
    }

    /// Request a stop; takes effect within one cycle
    pub fn stop(&self) {
        let mut running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((token, _)) = running.take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        let running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        matches!(running.as_ref(), Some((_, handle)) if !handle.is_finished())
    }
}

impl Drop for BacklogIndicator {
    fn drop(&mut self) {
        self.stop();
    }
}
