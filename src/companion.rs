//! Companion (wrist) display state.
//!
//! The companion never parses notifications. Its store is a mirror fed only
//! by the propagation channel: pushed readings, periodic pulls, and pulls
//! triggered by a sync request. Every path goes through [`Companion::apply`],
//! which runs the same `set_latest`/`append`/`classify` logic as the ingest
//! side. Renderers observe the derived [`DisplayState`] through a watch
//! channel instead of reaching into shared globals.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::display::DisplayState;
use crate::history::ReadingStore;
use crate::models::Reading;
use crate::sync::Transport;

// ---

/// Handle to a background task. Cancelling or dropping it stops only that task.
#[derive(Debug)]
pub struct TaskHandle {
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct Companion<T: Transport> {
    // ---
    store: Mutex<ReadingStore>,
    state: watch::Sender<DisplayState>,
    transport: Arc<T>,
}

impl<T: Transport> Companion<T> {
    // ---
    pub fn new(transport: Arc<T>, history_capacity: usize) -> Self {
        // ---
        let (state, _) = watch::channel(DisplayState::default());
        Self {
            store: Mutex::new(ReadingStore::new(history_capacity)),
            state,
            transport,
        }
    }

    fn store(&self) -> MutexGuard<'_, ReadingStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Observe display state. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> DisplayState {
        self.state.borrow().clone()
    }

    pub fn latest(&self) -> Option<Reading> {
        self.store().latest()
    }

    pub fn history(&self) -> Vec<Reading> {
        self.store().history().to_vec()
    }

    /// Mirror a reading received over the channel. Out-of-domain payloads are dropped.
    pub fn apply(&self, reading: Reading) -> bool {
        self.apply_at(reading, Utc::now().timestamp_millis())
    }

    pub fn apply_at(&self, reading: Reading, now: i64) -> bool {
        // ---
        if !reading.is_valid() {
            warn!("Dropping out-of-range sync payload: {:?}", reading);
            return false;
        }

        let state = {
            let mut store = self.store();
            store.record(reading);
            DisplayState::from_store(&store, now)
        };

        debug!(
            "Companion updated: {} ts={}",
            state.display, reading.timestamp
        );
        self.state.send_replace(state);
        true
    }

    /// Pull the latest delivered reading and apply it.
    pub async fn resync(&self) -> Option<Reading> {
        // ---
        match self.transport.fetch_latest().await {
            Some(reading) => {
                self.apply(reading);
                Some(reading)
            }
            None => {
                debug!("Resync: no glycemia in delivery layer");
                None
            }
        }
    }

    pub fn refresh_time_ago(&self) {
        self.refresh_time_ago_at(Utc::now().timestamp_millis());
    }

    pub fn refresh_time_ago_at(&self, now: i64) {
        self.state.send_if_modified(|state| state.refresh_time_ago(now));
    }
}

impl<T: Transport> Companion<T> {
    // ---
    /// Pull on a fixed interval, starting immediately.
    pub fn start_polling(self: &Arc<Self>, every: Duration) -> TaskHandle {
        // ---
        let companion = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                companion.resync().await;
            }
        });
        info!("Companion polling every {:?}", every);
        TaskHandle { handle }
    }

    /// Recompute the relative time on a fixed interval, first after one period.
    pub fn start_time_ago_refresh(self: &Arc<Self>, every: Duration) -> TaskHandle {
        // ---
        let companion = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            loop {
                ticker.tick().await;
                companion.refresh_time_ago();
            }
        });
        TaskHandle { handle }
    }

    /// Apply every reading published on an in-process change feed.
    pub fn listen(self: &Arc<Self>, mut feed: watch::Receiver<Option<Reading>>) -> TaskHandle {
        // ---
        let companion = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while feed.changed().await.is_ok() {
                let pushed = *feed.borrow_and_update();
                if let Some(reading) = pushed {
                    companion.apply(reading);
                }
            }
        });
        TaskHandle { handle }
    }
}
