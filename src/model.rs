/// Core data types for the FKLIM warehouse loader.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O and no external dependencies beyond `chrono`, only
/// types and the parameter name table.

use chrono::NaiveDateTime;

// ---------------------------------------------------------------------------
// Tracked parameters
// ---------------------------------------------------------------------------

/// Number of measured parameters tracked per daily FKLIM observation.
pub const PARAMETER_COUNT: usize = 18;

/// Canonical column names of the eighteen tracked parameters, in the order
/// used by the fact table and the availability summary tables. The
/// availability aggregator iterates this table, so the order here must match
/// the `availability_*` column order in `sql/001_warehouse_schema.sql`.
pub const PARAMETERS: [&str; PARAMETER_COUNT] = [
    "temp_07lt_c",
    "temp_13lt_c",
    "temp_18lt_c",
    "temp_avg_c",
    "temp_max_c",
    "temp_min_c",
    "rainfall_mm",
    "sunshine_h",
    "weather_specific",
    "pressure_mb",
    "rel_humidity_07lt_pc",
    "rel_humidity_13lt_pc",
    "rel_humidity_18lt_pc",
    "rel_humidity_avg_pc",
    "wind_speed_avg_km_h",
    "wind_dir_max",
    "wind_speed_max_knots",
    "wind_dir_cardinal",
];

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// A canonical daily climatology observation for one station.
///
/// Identified by `(station_sk, timestamp)`, the composite key the upsert
/// engine keeps unique across the fact table. A `None` parameter means
/// "not measured"; source sentinels (9999/8888) and missing markers are
/// already normalized away by the time a value lands here.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Surrogate key from `dim_stations`.
    pub station_sk: i32,
    /// External WMO identifier, kept for provenance.
    pub wmo_id: String,
    pub station_name: Option<String>,
    /// Observation instant, timezone-naive (station local date).
    pub timestamp: NaiveDateTime,

    pub temp_07lt_c: Option<f64>,
    pub temp_13lt_c: Option<f64>,
    pub temp_18lt_c: Option<f64>,
    pub temp_avg_c: Option<f64>,
    pub temp_max_c: Option<f64>,
    pub temp_min_c: Option<f64>,
    pub rainfall_mm: Option<f64>,
    pub sunshine_h: Option<f64>,
    pub weather_specific: Option<String>,
    pub pressure_mb: Option<f64>,
    pub rel_humidity_07lt_pc: Option<f64>,
    pub rel_humidity_13lt_pc: Option<f64>,
    pub rel_humidity_18lt_pc: Option<f64>,
    pub rel_humidity_avg_pc: Option<f64>,
    pub wind_speed_avg_km_h: Option<f64>,
    pub wind_dir_max: Option<f64>,
    pub wind_speed_max_knots: Option<f64>,
    pub wind_dir_cardinal: Option<String>,

    /// Which source produced the record (e.g. "bmkgsatu", "oracle_csv").
    pub source_data: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl Observation {
    /// Composite key used for deduplication and conflict detection.
    pub fn key(&self) -> (i32, NaiveDateTime) {
        (self.station_sk, self.timestamp)
    }

    /// Presence flags for the eighteen tracked parameters, in
    /// `PARAMETERS` order. Consumed by the availability aggregator.
    pub fn presence(&self) -> [bool; PARAMETER_COUNT] {
        [
            self.temp_07lt_c.is_some(),
            self.temp_13lt_c.is_some(),
            self.temp_18lt_c.is_some(),
            self.temp_avg_c.is_some(),
            self.temp_max_c.is_some(),
            self.temp_min_c.is_some(),
            self.rainfall_mm.is_some(),
            self.sunshine_h.is_some(),
            self.weather_specific.is_some(),
            self.pressure_mb.is_some(),
            self.rel_humidity_07lt_pc.is_some(),
            self.rel_humidity_13lt_pc.is_some(),
            self.rel_humidity_18lt_pc.is_some(),
            self.rel_humidity_avg_pc.is_some(),
            self.wind_speed_avg_km_h.is_some(),
            self.wind_dir_max.is_some(),
            self.wind_speed_max_knots.is_some(),
            self.wind_dir_cardinal.is_some(),
        ]
    }
}

/// Wind speed unit reported by a source.
///
/// The export API already reports average wind speed in km/h and max wind
/// speed in knots; the Oracle CSV exports report both in m/s and need
/// conversion during normalization. This is per-source configuration, never
/// inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindUnit {
    /// Both wind speed columns are m/s; convert avg ×3.6 (km/h) and
    /// max ×1.94384 (knots).
    MetersPerSecond,
    /// Already km/h (avg) and knots (max); store as-is.
    KmhKnots,
}

// ---------------------------------------------------------------------------
// Per-record classification
// ---------------------------------------------------------------------------

/// Outcome of normalizing one raw source record.
///
/// Expected conditions ("station not in dim_stations", "unparseable
/// timestamp") are values, not errors: the caller tallies them and the run
/// continues.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRecord {
    Accepted(Box<Observation>),
    /// The station identifier has no surrogate key in the directory.
    UnknownStation { wmo_id: String },
    /// The timestamp field could not be parsed; the record is excluded.
    BadTimestamp { wmo_id: String, raw: String },
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Counters reported at the end of every ingestion run, zeros included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Rows written (inserted, or overwritten in upsert mode).
    pub inserted: u64,
    /// Rows whose key already existed (store) or repeated within the batch.
    pub skipped_duplicate: u64,
    pub skipped_unknown_station: u64,
    pub rejected_bad_timestamp: u64,
    /// Rows whose individual write errored; siblings are unaffected.
    pub failed: u64,
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "inserted: {}, skipped_duplicate: {}, skipped_unknown_station: {}, \
             rejected_bad_timestamp: {}, failed: {}",
            self.inserted,
            self.skipped_duplicate,
            self.skipped_unknown_station,
            self.rejected_bad_timestamp,
            self.failed
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Fatal errors that abort an entire run.
///
/// Everything here terminates with a non-zero exit; per-record problems
/// never reach this type (they are `NormalizedRecord` variants or `failed`
/// counts instead).
#[derive(Debug)]
pub enum EtlError {
    /// Could not reach the export API at all (connect/timeout).
    RequestFailed(String),
    /// Non-2xx HTTP response from the export API.
    HttpError(u16),
    /// The API payload could not be deserialized as JSON records.
    ParseError(String),
    /// Could not connect to or query the warehouse.
    DatabaseError(String),
    /// Missing or invalid configuration.
    ConfigError(String),
    /// Could not read a source CSV file.
    IoError(String),
}

impl std::fmt::Display for EtlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EtlError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            EtlError::HttpError(code) => write!(f, "HTTP error: {}", code),
            EtlError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            EtlError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            EtlError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            EtlError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for EtlError {}

impl From<postgres::Error> for EtlError {
    fn from(e: postgres::Error) -> Self {
        EtlError::DatabaseError(e.to_string())
    }
}

impl From<std::io::Error> for EtlError {
    fn from(e: std::io::Error) -> Self {
        EtlError::IoError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn blank_observation() -> Observation {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Observation {
            station_sk: 1,
            wmo_id: "96001".to_string(),
            station_name: None,
            timestamp: ts,
            temp_07lt_c: None,
            temp_13lt_c: None,
            temp_18lt_c: None,
            temp_avg_c: None,
            temp_max_c: None,
            temp_min_c: None,
            rainfall_mm: None,
            sunshine_h: None,
            weather_specific: None,
            pressure_mb: None,
            rel_humidity_07lt_pc: None,
            rel_humidity_13lt_pc: None,
            rel_humidity_18lt_pc: None,
            rel_humidity_avg_pc: None,
            wind_speed_avg_km_h: None,
            wind_dir_max: None,
            wind_speed_max_knots: None,
            wind_dir_cardinal: None,
            source_data: None,
            updated_at: ts,
        }
    }

    #[test]
    fn test_parameter_table_has_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for name in PARAMETERS {
            assert!(seen.insert(name), "duplicate parameter name '{}'", name);
        }
    }

    #[test]
    fn test_presence_order_matches_parameter_table() {
        let mut obs = blank_observation();
        obs.temp_07lt_c = Some(24.0);
        obs.wind_dir_cardinal = Some("NW".to_string());

        let presence = obs.presence();
        assert_eq!(presence.len(), PARAMETER_COUNT);
        assert!(presence[0], "temp_07lt_c is the first tracked parameter");
        assert!(presence[PARAMETER_COUNT - 1], "wind_dir_cardinal is the last");
        assert_eq!(presence.iter().filter(|p| **p).count(), 2);
    }

    #[test]
    fn test_summary_display_includes_all_counters_when_zero() {
        let rendered = BatchSummary::default().to_string();
        for label in [
            "inserted",
            "skipped_duplicate",
            "skipped_unknown_station",
            "rejected_bad_timestamp",
            "failed",
        ] {
            assert!(rendered.contains(label), "summary should mention '{}'", label);
        }
    }
}
