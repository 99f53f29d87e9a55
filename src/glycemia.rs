//! Unit conversion and range classification for glycemia readings.
//!
//! This is the single table shared by the ingest service and the companion
//! display. Both sides classify through these functions so the bands cannot
//! drift apart.

use serde::Serialize;

use crate::models::{GlycemiaUnit, Reading};

// ---

/// mg/dL per mmol/L for glucose.
pub const MMOL_TO_MG_DL: f64 = 18.0182;

/// Below this (mg/dL) a reading is low.
pub const LOW_BELOW_MG_DL: f64 = 70.0;

/// Upper bound (inclusive, mg/dL) of the target range.
pub const IN_RANGE_MAX_MG_DL: f64 = 180.0;

/// Upper bound (inclusive, mg/dL) of the high band.
pub const HIGH_MAX_MG_DL: f64 = 250.0;

/// Clinical range band. Advisory, display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Low,
    InRange,
    High,
    VeryHigh,
}

impl Status {
    /// Human readable label shown next to the value.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Low => "Low",
            Status::InRange => "In range",
            Status::High => "High",
            Status::VeryHigh => "Very high",
        }
    }
}

/// Convert a value to mg/dL, the unit all thresholds are expressed in.
pub fn to_mg_dl(value: f64, unit: GlycemiaUnit) -> f64 {
    match unit {
        GlycemiaUnit::MgDl => value,
        GlycemiaUnit::MmolL => value * MMOL_TO_MG_DL,
    }
}

/// Map a value to its band. Each band is closed on its upper side, except the top one.
pub fn classify(value: f64, unit: GlycemiaUnit) -> Status {
    // ---
    let mg_dl = to_mg_dl(value, unit);
    if mg_dl < LOW_BELOW_MG_DL {
        Status::Low
    } else if mg_dl <= IN_RANGE_MAX_MG_DL {
        Status::InRange
    } else if mg_dl <= HIGH_MAX_MG_DL {
        Status::High
    } else {
        Status::VeryHigh
    }
}

/// Hex color token for a band. Low and very high share the alert red.
pub fn color_for(status: Status) -> &'static str {
    match status {
        Status::Low => "#E57373",
        Status::InRange => "#81C784",
        Status::High => "#FFB74D",
        Status::VeryHigh => "#E57373",
    }
}

/// Same palette as [`color_for`], as opaque ARGB for the wrist display.
pub fn status_argb(status: Status) -> u32 {
    match status {
        Status::Low => 0xFFE5_7373,
        Status::InRange => 0xFF81_C784,
        Status::High => 0xFFFF_B74D,
        Status::VeryHigh => 0xFFE5_7373,
    }
}

impl Reading {
    pub fn mg_dl(&self) -> f64 {
        to_mg_dl(self.value, self.unit)
    }

    pub fn status(&self) -> Status {
        classify(self.value, self.unit)
    }
}
