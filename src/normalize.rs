/// Value normalization shared by both ingest paths.
///
/// Every coercion here is total: malformed input yields `None`, never a
/// panic or an error. The sentinel and thousands-format rules mirror what
/// the upstream Oracle view and the bmkgsatu export actually emit.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::model::WindUnit;

// ---------------------------------------------------------------------------
// Unit conversion factors
// ---------------------------------------------------------------------------

/// 1 m/s = 3.6 km/h
pub const MS_TO_KMH: f64 = 3.6;

/// 1 m/s = 1.94384 knots
pub const MS_TO_KNOTS: f64 = 1.94384;

// ---------------------------------------------------------------------------
// Numeric coercion
// ---------------------------------------------------------------------------

/// Placeholder numbers some stations report instead of leaving a field empty.
fn is_sentinel(x: f64) -> bool {
    x == 9999.0 || x == 8888.0
}

/// CSV cell values that mean "no data" in the Oracle exports.
fn is_missing_marker(s: &str) -> bool {
    matches!(s, "" | "-" | "N/A" | "NA")
}

/// Detects thousands-separator formatting: groups of exactly three digits
/// separated by dots after a 1-3 digit lead group, e.g. "1.234" or
/// "1.234.567". Requires at least two groups, which is what distinguishes
/// it from plain decimal notation ("12.3" has a two-digit fraction and
/// does not match).
fn is_thousands_formatted(s: &str) -> bool {
    let mut groups = s.split('.');
    let lead = match groups.next() {
        Some(g) => g,
        None => return false,
    };
    if lead.is_empty() || lead.len() > 3 || !lead.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let mut rest = 0;
    for group in groups {
        if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        rest += 1;
    }
    rest >= 1
}

/// Coerces a raw string cell to a float.
///
/// Order matters: missing markers first, then thousands un-formatting, then
/// parse, then the 9999/8888 sentinel check (so the string "9999" and the
/// number 9999 normalize the same way). Anything unparseable is `None`.
pub fn coerce_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if is_missing_marker(trimmed) {
        return None;
    }
    let unformatted;
    let candidate = if is_thousands_formatted(trimmed) {
        unformatted = trimmed.replace('.', "");
        unformatted.as_str()
    } else {
        trimmed
    };
    let value: f64 = candidate.parse().ok()?;
    if is_sentinel(value) {
        return None;
    }
    Some(value)
}

/// Coerces a JSON field to a float. Numbers go through the sentinel check
/// directly; strings go through `coerce_number`; anything else is `None`.
pub fn coerce_json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => {
            let x = n.as_f64()?;
            if is_sentinel(x) {
                None
            } else {
                Some(x)
            }
        }
        Value::String(s) => coerce_number(s),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Text coercion
// ---------------------------------------------------------------------------

/// Coerces a raw string cell to free text; empty cells and missing markers
/// become `None`.
pub fn coerce_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if is_missing_marker(trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// JSON variant of `coerce_text`. Non-string scalars are rendered with
/// `to_string` so a numeric weather code still lands as text.
pub fn coerce_json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => coerce_text(s),
        Value::Null => None,
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Wind unit conversion
// ---------------------------------------------------------------------------

/// Average wind speed in km/h, converting from m/s when the source reports
/// m/s.
pub fn wind_avg_kmh(value: Option<f64>, unit: WindUnit) -> Option<f64> {
    match unit {
        WindUnit::MetersPerSecond => value.map(|v| v * MS_TO_KMH),
        WindUnit::KmhKnots => value,
    }
}

/// Max wind speed in knots, converting from m/s when the source reports m/s.
pub fn wind_max_knots(value: Option<f64>, unit: WindUnit) -> Option<f64> {
    match unit {
        WindUnit::MetersPerSecond => value.map(|v| v * MS_TO_KNOTS),
        WindUnit::KmhKnots => value,
    }
}

// ---------------------------------------------------------------------------
// Timestamp parsing
// ---------------------------------------------------------------------------

/// Formats seen across the sources: the export API emits ISO 8601 without an
/// offset ("2025-08-06T00:00"), the Oracle CSVs emit "%d-%m-%Y" or
/// "%Y-%m-%d %H:%M:%S" depending on export vintage.
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d-%m-%Y"];

/// Parses an observation timestamp into a timezone-naive instant.
///
/// An RFC 3339 string with an offset keeps its local clock time (the
/// warehouse stores station-local dates). Returns `None` for anything
/// unparseable; the caller classifies that record as rejected.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
