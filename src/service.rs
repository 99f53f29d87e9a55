//! Ingest pipeline of the phone-side service.
//!
//! Notification → source filter → text assembly → parse → store update,
//! then persistence and companion propagation, each fire-and-forget and
//! independent of the other. A failure in either one never rolls back the
//! in-memory update.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use crate::history::{ReadingStore, TrendPoint};
use crate::models::Reading;
use crate::notification::NotificationPayload;
use crate::parser::parse_notification;
use crate::source::accepts_source;
use crate::storage::{PersistHandle, Storage};
use crate::sync::Propagator;

// ---

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub history_capacity: usize,
    /// Accept notifications posted from the developer shell as well.
    pub allow_shell_source: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            history_capacity: crate::history::INGEST_HISTORY_CAPACITY,
            allow_shell_source: false,
        }
    }
}

pub struct IngestService {
    // ---
    store: Mutex<ReadingStore>,
    storage: Storage,
    persist: PersistHandle,
    propagator: Propagator,
    options: IngestOptions,
}

impl IngestService {
    // ---
    /// Build the service, seeding the in-memory store from persisted state.
    pub async fn restore(storage: Storage, propagator: Propagator, options: IngestOptions) -> Self {
        // ---
        let latest = storage.load_latest().await;
        let history = storage.load_history(options.history_capacity).await;
        info!(
            "Restored glycemia state: latest={:?}, {} history entries",
            latest.map(|r| r.display_value()),
            history.len()
        );

        let store = ReadingStore::from_parts(latest, history, options.history_capacity);
        let persist = PersistHandle::spawn(storage.clone());

        Self {
            store: Mutex::new(store),
            storage,
            persist,
            propagator,
            options,
        }
    }

    fn store(&self) -> MutexGuard<'_, ReadingStore> {
        // Every critical section leaves the store consistent, so a poisoned lock is still usable.
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run a notification through the pipeline. Returns the accepted reading.
    pub fn ingest(&self, payload: &NotificationPayload) -> Option<Reading> {
        // ---
        let app_id = payload.app_id();
        if !accepts_source(app_id, self.options.allow_shell_source) {
            debug!("Ignoring notification from untrusted source '{}'", app_id);
            return None;
        }

        let text = payload.assemble_text();
        let Some(reading) = parse_notification(&text) else {
            debug!(
                "No glycemia in notification from '{}': {:?}",
                app_id,
                text.chars().take(200).collect::<String>()
            );
            return None;
        };

        info!(
            "Accepted {} from '{}' at ts={}",
            reading.display_value(),
            app_id,
            reading.timestamp
        );
        self.accept(reading);
        Some(reading)
    }

    /// Record a reading as latest and in history, then persist and propagate it.
    pub fn accept(&self, reading: Reading) {
        // ---
        let snapshot = {
            let mut store = self.store();
            store.record(reading);
            store.snapshot()
        };

        self.persist.schedule(snapshot);
        self.propagator.enqueue(reading);
    }

    /// Foreground resync: re-apply the latest known reading and push it again.
    ///
    /// Memory is authoritative inside this process; the persisted slot is
    /// only consulted when nothing is held in memory.
    pub async fn resync(&self) -> Option<Reading> {
        // ---
        let in_memory = self.latest();
        let reading = match in_memory {
            Some(reading) => reading,
            None => self.storage.load_latest().await?,
        };

        debug!("Resync re-applying ts={}", reading.timestamp);
        self.accept(reading);
        Some(reading)
    }

    /// Manual "sync to watch". False when there is nothing to send or it was dropped.
    pub fn push_latest(&self) -> bool {
        match self.latest() {
            Some(reading) => self.propagator.enqueue(reading),
            None => false,
        }
    }

    pub fn latest(&self) -> Option<Reading> {
        self.store().latest()
    }

    pub fn history(&self) -> Vec<Reading> {
        self.store().history().to_vec()
    }

    pub fn trend(&self) -> Vec<TrendPoint> {
        self.store().trend()
    }

    /// Delete one history entry by exact timestamp. No-op when absent.
    pub fn remove(&self, timestamp: i64) {
        // ---
        let snapshot = {
            let mut store = self.store();
            store.remove(timestamp);
            store.snapshot()
        };
        self.persist.schedule(snapshot);
    }

    pub fn clear_history(&self) {
        // ---
        let snapshot = {
            let mut store = self.store();
            store.clear_history();
            store.snapshot()
        };
        self.persist.schedule(snapshot);
    }

    /// Wait for the pending persistence write before exiting.
    pub async fn shutdown(self) {
        self.persist.shutdown().await;
    }
}
