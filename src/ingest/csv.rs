/// Oracle CSV export reader and normalizer.
///
/// The exports are plain comma-separated files with a header row. Column
/// names differ by export vintage: the Oracle view emits uppercase names
/// like `TEMPERATURE_07LT_C` / `TEMP_24H_MAX_C`, later exports emit
/// lowercase variants, and both map onto the canonical warehouse columns
/// below. Wind speeds in these files are m/s and converted during
/// normalization (the warehouse stores km/h for the average and knots for
/// the max).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::Utc;

use crate::model::{EtlError, NormalizedRecord, Observation, WindUnit};
use crate::normalize;
use crate::stations::StationDirectory;

// ---------------------------------------------------------------------------
// Header mapping
// ---------------------------------------------------------------------------

/// Source header → canonical column, applied after lowercasing and trimming.
/// Headers already carrying a canonical name pass through unchanged.
const HEADER_RENAMES: [(&str, &str); 13] = [
    ("temperature_07lt_c", "temp_07lt_c"),
    ("temperature_13lt_c", "temp_13lt_c"),
    ("temperature_18lt_c", "temp_18lt_c"),
    ("temperature_avg_c", "temp_avg_c"),
    ("temp_24h_max_c", "temp_max_c"),
    ("temp_24h_min_c", "temp_min_c"),
    ("rainfall_24h_mm", "rainfall_mm"),
    ("sunshine_24h_h", "sunshine_h"),
    ("qff_24h_mean_mb", "pressure_mb"),
    ("wind_speed_24h_mean_ms", "wind_speed_avg_km_h"),
    ("wind_speed_24h_max_ms", "wind_speed_max_knots"),
    ("wind_dir_24h_max_deg", "wind_dir_max"),
    ("wind_dir_24h_cardinal", "wind_dir_cardinal"),
];

/// Canonical name for one raw header cell.
pub fn canonical_header(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    for (source, canonical) in HEADER_RENAMES {
        if lowered == source {
            return canonical.to_string();
        }
    }
    lowered
}

/// Maps header cells to their column index under canonical names. Later
/// duplicates of a name are ignored (first column wins).
fn header_index(header_line: &str) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (i, cell) in header_line.split(',').enumerate() {
        index.entry(canonical_header(cell)).or_insert(i);
    }
    index
}

// ---------------------------------------------------------------------------
// File reading
// ---------------------------------------------------------------------------

/// Reads and normalizes one export file. Fatal when the file cannot be read
/// or its header lacks the key columns; per-row problems are classified.
pub fn read_file(
    path: &Path,
    directory: &StationDirectory,
    wind_unit: WindUnit,
    source_label: &str,
) -> Result<Vec<NormalizedRecord>, EtlError> {
    let text = fs::read_to_string(path)?;
    parse_export(&text, directory, wind_unit, source_label)
}

/// Parses a whole export body (header line plus data rows).
pub fn parse_export(
    text: &str,
    directory: &StationDirectory,
    wind_unit: WindUnit,
    source_label: &str,
) -> Result<Vec<NormalizedRecord>, EtlError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header_line = lines
        .next()
        .ok_or_else(|| EtlError::ParseError("empty CSV file".to_string()))?;

    let columns = header_index(header_line);
    for required in ["wmo_id", "data_timestamp"] {
        if !columns.contains_key(required) {
            return Err(EtlError::ParseError(format!(
                "CSV header has no '{}' column",
                required
            )));
        }
    }

    Ok(lines
        .map(|line| normalize_row(line, &columns, directory, wind_unit, source_label))
        .collect())
}

// ---------------------------------------------------------------------------
// Row normalization
// ---------------------------------------------------------------------------

fn normalize_row(
    line: &str,
    columns: &HashMap<String, usize>,
    directory: &StationDirectory,
    wind_unit: WindUnit,
    source_label: &str,
) -> NormalizedRecord {
    let fields: Vec<&str> = line.split(',').collect();

    // short rows leave trailing columns absent, same as an empty cell
    let cell = |name: &str| -> &str {
        columns
            .get(name)
            .and_then(|i| fields.get(*i))
            .map(|s| s.trim())
            .unwrap_or("")
    };
    let number = |name: &str| normalize::coerce_number(cell(name));
    let text = |name: &str| normalize::coerce_text(cell(name));

    let raw_id = cell("wmo_id");
    let station = match directory.lookup(raw_id) {
        Some(s) => s,
        None => {
            return NormalizedRecord::UnknownStation {
                wmo_id: raw_id.to_string(),
            }
        }
    };

    let raw_timestamp = cell("data_timestamp");
    let timestamp = match normalize::parse_timestamp(raw_timestamp) {
        Some(ts) => ts,
        None => {
            return NormalizedRecord::BadTimestamp {
                wmo_id: station.wmo_id.clone(),
                raw: raw_timestamp.to_string(),
            }
        }
    };

    let obs = Observation {
        station_sk: station.station_sk,
        wmo_id: station.wmo_id.clone(),
        // exports carry no station name; the dimension provides it
        station_name: station.name.clone(),
        timestamp,
        temp_07lt_c: number("temp_07lt_c"),
        temp_13lt_c: number("temp_13lt_c"),
        temp_18lt_c: number("temp_18lt_c"),
        temp_avg_c: number("temp_avg_c"),
        temp_max_c: number("temp_max_c"),
        temp_min_c: number("temp_min_c"),
        rainfall_mm: number("rainfall_mm"),
        sunshine_h: number("sunshine_h"),
        weather_specific: text("weather_specific"),
        pressure_mb: number("pressure_mb"),
        rel_humidity_07lt_pc: number("rel_humidity_07lt_pc"),
        rel_humidity_13lt_pc: number("rel_humidity_13lt_pc"),
        rel_humidity_18lt_pc: number("rel_humidity_18lt_pc"),
        rel_humidity_avg_pc: number("rel_humidity_avg_pc"),
        wind_speed_avg_km_h: normalize::wind_avg_kmh(number("wind_speed_avg_km_h"), wind_unit),
        wind_dir_max: number("wind_dir_max"),
        wind_speed_max_knots: normalize::wind_max_knots(
            number("wind_speed_max_knots"),
            wind_unit,
        ),
        wind_dir_cardinal: text("wind_dir_cardinal"),
        source_data: Some(source_label.to_string()),
        updated_at: Utc::now().naive_utc(),
    };

    NormalizedRecord::Accepted(Box::new(obs))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
