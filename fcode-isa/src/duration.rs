//! Duration literals.
//!
//! Durations are stored as nanosecond ticks in the pod duration table; in
//! assembly text they carry a unit suffix (`5 ms`, `2 sec`). Formatting picks
//! the largest unit that divides the tick count exactly so a formatted value
//! parses back to the same ticks.

/// Errors from [`parse_ticks`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    /// The literal has no recognized unit suffix.
    #[error("invalid duration literal: {0:?}")]
    BadUnit(String),
    /// The numeric part is not a valid integer.
    #[error("invalid duration magnitude: {0:?}")]
    BadMagnitude(String),
}

/// Unit suffixes and their tick multipliers, largest first.
const UNITS: &[(&str, i64)] = &[
    ("day", 86_400_000_000_000),
    ("hr", 3_600_000_000_000),
    ("min", 60_000_000_000),
    ("sec", 1_000_000_000),
    ("ms", 1_000_000),
    ("ns", 1),
];

/// Parse a suffixed duration literal into nanosecond ticks. Underscore digit
/// separators are permitted.
pub fn parse_ticks(literal: &str) -> Result<i64, DurationError> {
    let text: String = literal.chars().filter(|c| *c != '_').collect();
    let text = text.trim();
    for (suffix, multiplier) in UNITS {
        if let Some(magnitude) = text.strip_suffix(suffix) {
            let value: i64 = magnitude
                .trim()
                .parse()
                .map_err(|_| DurationError::BadMagnitude(literal.to_string()))?;
            return value
                .checked_mul(*multiplier)
                .ok_or_else(|| DurationError::BadMagnitude(literal.to_string()));
        }
    }
    Err(DurationError::BadUnit(literal.to_string()))
}

/// Format nanosecond ticks using the largest exact unit.
pub fn format_ticks(ticks: i64) -> String {
    for (suffix, multiplier) in UNITS {
        if ticks % multiplier == 0 {
            return format!("{} {}", ticks / multiplier, suffix);
        }
    }
    // ns divides everything; unreachable, but keep a sane fallback.
    format!("{ticks} ns")
}
