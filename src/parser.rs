//! Glycemia extraction from notification text.
//!
//! The vendor app does not publish a stable notification format, so the
//! parser is an ordered rule table rather than a grammar. Each rule names a
//! regex, the unit a match implies, and the capture group holding the number.
//! Rules are tried strictly in table order and the first one that yields an
//! in-range value wins. A candidate that fails validation falls through to
//! the next rule instead of aborting the parse.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{GlycemiaUnit, Reading};

// ---

/// One extraction rule: matcher, implied unit, capture group of the value.
#[derive(Debug, Clone)]
pub struct PatternRule {
    // ---
    pub regex: Regex,
    pub unit: GlycemiaUnit,
    pub group: usize,
}

impl PatternRule {
    // ---
    pub fn new(pattern: &str, unit: GlycemiaUnit, group: usize) -> Result<Self, regex::Error> {
        // ---
        Ok(PatternRule {
            regex: Regex::new(pattern)?,
            unit,
            group,
        })
    }

    /// Run this rule alone. `None` when it does not match or the number is unusable.
    pub fn extract(&self, text: &str, timestamp: i64) -> Option<Reading> {
        // ---
        let raw = self.regex.captures(text)?.get(self.group)?.as_str();
        let value = raw.parse::<f64>().ok()?;
        Reading::new(value, self.unit, timestamp)
    }
}

/// The canonical rule table, highest priority first.
pub static DEFAULT_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    use GlycemiaUnit::{MgDl, MmolL};

    [
        (r"(?i)([0-9]+\.?[0-9]*)\s*mmol/L", MmolL),
        (r"(?i)([0-9]+\.?[0-9]*)\s*mg/dL", MgDl),
        (r"(?i)BG[:\s]*([0-9]+\.?[0-9]*)", MmolL),
        (r"(?i)glucose[:\s]*([0-9]+\.?[0-9]*)", MmolL),
        (r"(?i)([0-9]+\.?[0-9]*)\s*mmol", MmolL),
        (r"(?i)([0-9]+\.?[0-9]*)\s*mg\s*dL", MgDl),
        (r"(?i)([0-9]+\.?[0-9]*)\s*mg/dl", MgDl),
        // Shadowed by the case-insensitive glucose rule; kept as a fallback.
        (r"[Gg]lucose[:\s]*([0-9]+\.?[0-9]*)", MmolL),
        (r"(?i)CGM[:\s]*([0-9]+\.?[0-9]*)", MmolL),
        (r"([0-9]+\.?[0-9]*)\s*[→↑↓↗↘⇈⇊]", MmolL),
    ]
    .into_iter()
    .filter_map(|(pattern, unit)| match PatternRule::new(pattern, unit, 1) {
        Ok(rule) => Some(rule),
        Err(e) => {
            tracing::error!("Invalid glycemia pattern {:?}: {}", pattern, e);
            None
        }
    })
    .collect()
});

/// Parse assembled notification text, stamping the reading with the current time.
pub fn parse_notification(text: &str) -> Option<Reading> {
    parse_with_rules(&DEFAULT_RULES, text, Utc::now().timestamp_millis())
}

/// Parse against an explicit rule table and timestamp.
///
/// Empty or whitespace-only input returns `None` without evaluating any rule.
pub fn parse_with_rules(rules: &[PatternRule], text: &str, timestamp: i64) -> Option<Reading> {
    // ---
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    rules.iter().find_map(|rule| rule.extract(text, timestamp))
}
