//! Presentation helpers shared by the phone view and the wrist display.
//!
//! All formatting is a deterministic function of a timestamp, "now" and a
//! UTC offset, so none of it needs a clock to test.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Serialize;

use crate::glycemia::{color_for, status_argb, Status};
use crate::history::{ReadingStore, TrendPoint};
use crate::models::Reading;

// ---

const MINUTE_MS: i64 = 60_000;

/// Placeholder shown while no reading is known.
pub const EMPTY_DISPLAY: &str = "--";

/// Relative age of a reading: `Just now`, `Nm ago`, `Nh ago` or `Nd ago`.
pub fn format_time_ago(timestamp: i64, now: i64) -> String {
    // ---
    if timestamp <= 0 {
        return String::new();
    }

    let minutes = (now - timestamp).div_euclid(MINUTE_MS);
    let hours = minutes.div_euclid(60);
    let days = hours.div_euclid(24);

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else {
        format!("{days}d ago")
    }
}

fn local(timestamp: i64, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::<Utc>::from_timestamp_millis(timestamp).map(|t| t.with_timezone(&offset))
}

/// Absolute time of a reading: `HH:MM` today, otherwise `Mon D HH:MM`.
pub fn format_time(timestamp: i64, now: i64, offset: FixedOffset) -> String {
    // ---
    let (Some(at), Some(today)) = (local(timestamp, offset), local(now, offset)) else {
        return String::new();
    };

    if at.date_naive() == today.date_naive() {
        at.format("%H:%M").to_string()
    } else {
        at.format("%b %-d %H:%M").to_string()
    }
}

/// Wall clock shown on the wrist display.
pub fn format_clock(now: i64, offset: FixedOffset) -> String {
    local(now, offset)
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default()
}

/// Offset from whole minutes east of UTC. Out-of-range values fall back to UTC.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

/// A reading as the phone view lists it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingView {
    // ---
    #[serde(flatten)]
    pub reading: Reading,
    pub status: Status,
    pub status_label: &'static str,
    pub color: &'static str,
    pub time_ago: String,
    pub time: String,
}

impl ReadingView {
    pub fn new(reading: Reading, now: i64, offset: FixedOffset) -> Self {
        // ---
        let status = reading.status();
        Self {
            reading,
            status,
            status_label: status.label(),
            color: color_for(status),
            time_ago: format_time_ago(reading.timestamp, now),
            time: format_time(reading.timestamp, now, offset),
        }
    }
}

/// Everything the wrist display renders, derived from the mirror store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayState {
    // ---
    pub reading: Option<Reading>,
    /// `7.2 mmol/L`, or `--` with no reading.
    pub display: String,
    pub status: Option<Status>,
    pub status_label: String,
    pub color: Option<&'static str>,
    pub argb: Option<u32>,
    pub time_ago: String,
    pub trend: Vec<TrendPoint>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            reading: None,
            display: EMPTY_DISPLAY.to_string(),
            status: None,
            status_label: String::new(),
            color: None,
            argb: None,
            time_ago: String::new(),
            trend: Vec::new(),
        }
    }
}

impl DisplayState {
    // ---
    pub fn from_store(store: &ReadingStore, now: i64) -> Self {
        // ---
        let Some(reading) = store.latest() else {
            return Self {
                trend: store.trend(),
                ..Self::default()
            };
        };

        let status = reading.status();
        Self {
            reading: Some(reading),
            display: reading.display_value(),
            status: Some(status),
            status_label: status.label().to_string(),
            color: Some(color_for(status)),
            argb: Some(status_argb(status)),
            time_ago: format_time_ago(reading.timestamp, now),
            trend: store.trend(),
        }
    }

    /// Recompute only the relative time. Returns true when it changed.
    pub fn refresh_time_ago(&mut self, now: i64) -> bool {
        // ---
        let Some(reading) = self.reading else {
            return false;
        };
        let time_ago = format_time_ago(reading.timestamp, now);
        if time_ago == self.time_ago {
            return false;
        }
        self.time_ago = time_ago;
        true
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::GlycemiaUnit;

    // 2025-03-26T18:45:00Z
    const NOW: i64 = 1_743_014_700_000;

    #[test]
    fn test_time_ago_thresholds() {
        // ---
        assert_eq!(format_time_ago(NOW, NOW), "Just now");
        assert_eq!(format_time_ago(NOW - 59_999, NOW), "Just now");
        assert_eq!(format_time_ago(NOW - 60_000, NOW), "1m ago");
        assert_eq!(format_time_ago(NOW - 59 * MINUTE_MS, NOW), "59m ago");
        assert_eq!(format_time_ago(NOW - 60 * MINUTE_MS, NOW), "1h ago");
        assert_eq!(format_time_ago(NOW - 24 * 60 * MINUTE_MS + 1, NOW), "23h ago");
        assert_eq!(format_time_ago(NOW - 24 * 60 * MINUTE_MS, NOW), "1d ago");
        assert_eq!(format_time_ago(NOW - 3 * 24 * 60 * MINUTE_MS, NOW), "3d ago");
    }

    #[test]
    fn test_time_ago_edge_inputs() {
        // ---
        assert_eq!(format_time_ago(0, NOW), "");
        // Reading from a clock slightly ahead of ours.
        assert_eq!(format_time_ago(NOW + 5_000, NOW), "Just now");
    }

    #[test]
    fn test_absolute_time() {
        // ---
        let utc = offset_from_minutes(0);
        assert_eq!(format_time(NOW - 15 * MINUTE_MS, NOW, utc), "18:30");
        assert_eq!(format_time(NOW - 24 * 60 * MINUTE_MS, NOW, utc), "Mar 25 18:45");

        // 18:45 UTC is 13:45 at UTC-5.
        let est = offset_from_minutes(-300);
        assert_eq!(format_time(NOW, NOW, est), "13:45");
        assert_eq!(format_clock(NOW, est), "13:45");
    }

    #[test]
    fn test_offset_fallback() {
        assert_eq!(offset_from_minutes(100_000), Utc.fix());
        assert_eq!(offset_from_minutes(i32::MAX), Utc.fix());
        assert_eq!(offset_from_minutes(i32::MIN), Utc.fix());
    }

    #[test]
    fn test_reading_view() {
        // ---
        let reading = Reading::new(145.0, GlycemiaUnit::MgDl, NOW - 90 * MINUTE_MS).unwrap();
        let view = ReadingView::new(reading, NOW, offset_from_minutes(0));
        assert_eq!(view.status, Status::InRange);
        assert_eq!(view.status_label, "In range");
        assert_eq!(view.color, "#81C784");
        assert_eq!(view.time_ago, "1h ago");
        assert_eq!(view.time, "17:15");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["unit"], "mg/dL");
        assert_eq!(json["status"], "in_range");
    }

    #[test]
    fn test_display_state_from_store() {
        // ---
        let mut store = ReadingStore::new(48);
        let empty = DisplayState::from_store(&store, NOW);
        assert_eq!(empty.display, "--");
        assert!(empty.status.is_none());

        store.record(Reading::new(12.5, GlycemiaUnit::MmolL, NOW - 2 * MINUTE_MS).unwrap());
        let state = DisplayState::from_store(&store, NOW);
        assert_eq!(state.display, "12.5 mmol/L");
        assert_eq!(state.status, Some(Status::High));
        assert_eq!(state.status_label, "High");
        assert_eq!(state.color, Some("#FFB74D"));
        assert_eq!(state.time_ago, "2m ago");
        assert_eq!(state.trend.len(), 1);
    }

    #[test]
    fn test_refresh_time_ago() {
        // ---
        let mut store = ReadingStore::new(48);
        store.record(Reading::new(6.0, GlycemiaUnit::MmolL, NOW).unwrap());
        let mut state = DisplayState::from_store(&store, NOW);

        assert!(!state.refresh_time_ago(NOW + 1_000));
        assert!(state.refresh_time_ago(NOW + 5 * MINUTE_MS));
        assert_eq!(state.time_ago, "5m ago");
        assert!(!DisplayState::default().refresh_time_ago(NOW));
    }
}
