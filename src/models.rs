//! Simple data models for the glycemia pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---

/// Upper bound accepted for a reading value, in whichever unit it was captured.
pub const MAX_READING_VALUE: f64 = 600.0;

/// Units a reading can be captured in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlycemiaUnit {
    // ---
    #[default]
    #[serde(rename = "mmol/L", alias = "mmol/l", alias = "MMOL/L")]
    MmolL,

    #[serde(rename = "mg/dL", alias = "mg/dl", alias = "MG/DL")]
    MgDl,
}

impl GlycemiaUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlycemiaUnit::MmolL => "mmol/L",
            GlycemiaUnit::MgDl => "mg/dL",
        }
    }
}

impl fmt::Display for GlycemiaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single glucose measurement.
///
/// Created once, at parse time or at cross-device receipt, and never mutated.
/// A newer measurement is always a new `Reading`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    pub value: f64,

    /// Missing on some sync payloads; the companion assumes mmol/L.
    #[serde(default)]
    pub unit: GlycemiaUnit,

    /// Milliseconds since the Unix epoch, on the capturing device's clock.
    #[serde(default)]
    pub timestamp: i64,
}

impl Reading {
    // ---
    /// Build a reading, rejecting values outside `0..=600`.
    pub fn new(value: f64, unit: GlycemiaUnit, timestamp: i64) -> Option<Self> {
        // ---
        let reading = Reading {
            value,
            unit,
            timestamp,
        };
        reading.is_valid().then_some(reading)
    }

    /// True when the value is a finite number inside the accepted domain.
    pub fn is_valid(&self) -> bool {
        self.value.is_finite() && (0.0..=MAX_READING_VALUE).contains(&self.value)
    }

    /// Value as shown on the wrist display, e.g. `7.2 mmol/L`.
    pub fn display_value(&self) -> String {
        format!("{:.1} {}", self.value, self.unit)
    }
}
