use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::Transport;
use crate::models::Reading;

// ---

/// One-way outbound queue toward the companion display.
///
/// At-most-once and unacknowledged: a reading is dropped when the queue is
/// full or the transport reports failure. Losses are repaired by the
/// companion's periodic resync, so there is no retry here.
#[derive(Debug, Clone)]
pub struct Propagator {
    tx: mpsc::Sender<Reading>,
}

impl Propagator {
    // ---
    /// Start the delivery worker. It stops once every `Propagator` clone is dropped.
    pub fn spawn<T: Transport>(transport: Arc<T>, depth: usize) -> Self {
        // ---
        let (tx, mut rx) = mpsc::channel::<Reading>(depth.max(1));

        tokio::spawn(async move {
            while let Some(reading) = rx.recv().await {
                if transport.send(&reading).await {
                    debug!(
                        "Delivered {} (ts={}) to companion",
                        reading.display_value(),
                        reading.timestamp
                    );
                } else if transport.has_push_target() {
                    warn!(
                        "Companion delivery failed for ts={}, awaiting next resync",
                        reading.timestamp
                    );
                } else {
                    debug!("No push target, kept ts={} local", reading.timestamp);
                }
            }
            debug!("Propagation worker stopped");
        });

        Self { tx }
    }

    /// Queue a reading for delivery without waiting. Returns false if it was dropped.
    pub fn enqueue(&self, reading: Reading) -> bool {
        // ---
        match self.tx.try_send(reading) {
            Ok(()) => true,
            Err(TrySendError::Full(r)) => {
                warn!("Outbound queue full, dropping ts={}", r.timestamp);
                false
            }
            Err(TrySendError::Closed(r)) => {
                warn!("Outbound queue closed, dropping ts={}", r.timestamp);
                false
            }
        }
    }
}
