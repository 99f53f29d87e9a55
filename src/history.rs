//! Latest-reading slot and bounded reading history.
//!
//! History is newest first, capped at a fixed capacity, and never holds two
//! readings whose timestamps are within [`DEDUP_WINDOW_MS`] of each other.
//! The vendor app tends to post an update and a summary notification within
//! the same second; both parse to the same logical reading and must collapse
//! into one entry.

use serde::Serialize;

use crate::models::Reading;

// ---

/// Readings closer than this (inclusive) are treated as one event.
pub const DEDUP_WINDOW_MS: i64 = 5_000;

/// History depth kept on the ingesting device.
pub const INGEST_HISTORY_CAPACITY: usize = 20;

/// History depth kept on the companion display.
pub const COMPANION_HISTORY_CAPACITY: usize = 48;

/// Insert `reading` into `history`, returning the new buffer.
///
/// Entries within the dedup window of `reading` are dropped, the reading is
/// placed at the front, order is restored newest-first, and the oldest
/// entries beyond `capacity` are evicted.
pub fn append(history: &[Reading], reading: Reading, capacity: usize) -> Vec<Reading> {
    // ---
    let mut updated = Vec::with_capacity(history.len() + 1);
    updated.push(reading);
    updated.extend(
        history
            .iter()
            .filter(|r| r.timestamp.abs_diff(reading.timestamp) > DEDUP_WINDOW_MS as u64)
            .copied(),
    );

    // Stable, so in-order deliveries keep plain prepend order.
    updated.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    updated.truncate(capacity);
    updated
}

/// Drop the entry with exactly `timestamp`. No-op when absent.
pub fn remove(history: &[Reading], timestamp: i64) -> Vec<Reading> {
    history
        .iter()
        .filter(|r| r.timestamp != timestamp)
        .copied()
        .collect()
}

/// A chart point: value in mg/dL at a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub mg_dl: f64,
    pub timestamp: i64,
}

/// Serializable view of a store, used for persistence and display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub latest: Option<Reading>,
    pub history: Vec<Reading>,
}

/// Latest reading plus bounded history for one device.
#[derive(Debug, Clone)]
pub struct ReadingStore {
    // ---
    latest: Option<Reading>,
    history: Vec<Reading>,
    capacity: usize,
}

impl ReadingStore {
    // ---
    pub fn new(capacity: usize) -> Self {
        Self {
            latest: None,
            history: Vec::new(),
            capacity,
        }
    }

    /// Rebuild from persisted state, re-imposing order, dedup and capacity.
    pub fn from_parts(latest: Option<Reading>, history: Vec<Reading>, capacity: usize) -> Self {
        // ---
        let mut store = Self::new(capacity);
        store.latest = latest;
        let mut ordered = history;
        ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        for reading in ordered {
            store.history = append(&store.history, reading, capacity);
        }
        store
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<Reading> {
        self.latest
    }

    pub fn history(&self) -> &[Reading] {
        &self.history
    }

    /// Replace the latest slot. Last write wins, regardless of timestamp order.
    pub fn set_latest(&mut self, reading: Reading) {
        self.latest = Some(reading);
    }

    pub fn append(&mut self, reading: Reading) {
        self.history = append(&self.history, reading, self.capacity);
    }

    /// Accept a reading: becomes latest and enters the history.
    pub fn record(&mut self, reading: Reading) {
        self.set_latest(reading);
        self.append(reading);
    }

    pub fn remove(&mut self, timestamp: i64) {
        self.history = remove(&self.history, timestamp);
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// History as chart points, oldest first.
    pub fn trend(&self) -> Vec<TrendPoint> {
        self.history
            .iter()
            .rev()
            .map(|r| TrendPoint {
                mg_dl: r.mg_dl(),
                timestamp: r.timestamp,
            })
            .collect()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            latest: self.latest,
            history: self.history.clone(),
        }
    }
}
