/// bmkgsatu export API client and record normalizer.
///
/// The export endpoint returns daily FKLIM records with the time-of-day
/// measurements nested under `m_0700ws` / `m_1300ws` / `m_1800ws`
/// sub-objects and the daily aggregates flat on the record. Field types are
/// loose (numbers arrive as numbers or strings, ids as strings or floats),
/// so everything goes through the coercions in `normalize`.

use chrono::Utc;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::model::{EtlError, NormalizedRecord, Observation, WindUnit};
use crate::normalize;
use crate::stations::{self, StationDirectory};

/// `_metadata` projection requested from the export endpoint. Matches the
/// fields the normalizer reads; anything else the upstream holds is not
/// transferred.
const METADATA_FIELDS: &str = "station_id,station_name,data_timestamp,alias_station_id,source_data,\
     m_0700ws[tbk_1c2m_0700],m_1300ws[tbk_1c2m_1300],m_1800ws[tbk_1c2m_1800],tbk_avg,\
     m_1800ws[t_max_1c2m],m_1300ws[t_min_1c2m],m_0700ws[rr_0700],m_0700ws[ss_8],m_0700ws[cu_khusus],\
     m_1800ws[pp_qfe_0000],m_0700ws[rh_1c2m_0700],m_1300ws[rh_1c2m_1300],m_1800ws[rh_1c2m_1800],rh_avg,\
     ff_avg_km_jm,wd_ff_max,ff_max,wd_cardinal";

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Fetches all FKLIM records in `[from, to]` (inclusive, "%Y-%m-%dT%H:%M"
/// bounds) in one request.
///
/// Any failure here is fatal to the run: an unreachable endpoint, a non-2xx
/// status, or a payload that is neither a JSON array nor `{"items": [...]}`.
pub fn fetch_records(config: &ApiConfig, from: &str, to: &str) -> Result<Vec<Value>, EtlError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| EtlError::RequestFailed(e.to_string()))?;

    let size = config.page_size.to_string();
    let response = client
        .get(&config.base_url)
        .basic_auth(&config.username, Some(&config.password))
        .query(&[
            ("type_name", config.type_name.as_str()),
            ("data_timestamp__gte", from),
            ("data_timestamp__lte", to),
            ("_size", size.as_str()),
            ("fdih_type", config.fdih_type.as_str()),
            ("_metadata", METADATA_FIELDS),
        ])
        .send()
        .map_err(|e| EtlError::RequestFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(EtlError::HttpError(response.status().as_u16()));
    }

    let payload: Value = response
        .json()
        .map_err(|e| EtlError::ParseError(e.to_string()))?;

    extract_items(payload)
}

/// The endpoint answers with either a bare array or an object carrying an
/// `items` array, depending on export mode.
pub fn extract_items(payload: Value) -> Result<Vec<Value>, EtlError> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(EtlError::ParseError(
                "response object has no 'items' array".to_string(),
            )),
        },
        other => Err(EtlError::ParseError(format!(
            "expected array or object, got {}",
            value_kind(&other)
        ))),
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

static NULL: Value = Value::Null;

/// Field access that treats a missing key as JSON null.
fn field<'a>(record: &'a Value, key: &str) -> &'a Value {
    record.get(key).unwrap_or(&NULL)
}

/// Sub-object access that tolerates the key being absent or not an object
/// (some stations report a bare string where the sub-object should be).
fn sub_field<'a>(record: &'a Value, sub: &str, key: &str) -> &'a Value {
    record
        .get(sub)
        .and_then(|v| v.as_object())
        .and_then(|m| m.get(key))
        .unwrap_or(&NULL)
}

/// Normalizes one raw API record into a canonical observation, or classifies
/// it as skipped/rejected. Never fails: malformed values become nulls.
pub fn normalize_record(
    record: &Value,
    directory: &StationDirectory,
    source_label: &str,
) -> NormalizedRecord {
    let raw_id = stations::canonical_id_from_json(field(record, "alias_station_id"));
    let wmo_id = match raw_id {
        Some(id) => id,
        None => {
            return NormalizedRecord::UnknownStation {
                wmo_id: field(record, "alias_station_id").to_string(),
            }
        }
    };

    let station = match directory.lookup(&wmo_id) {
        Some(s) => s,
        None => return NormalizedRecord::UnknownStation { wmo_id },
    };

    let raw_timestamp = field(record, "data_timestamp")
        .as_str()
        .unwrap_or_default();
    let timestamp = match normalize::parse_timestamp(raw_timestamp) {
        Some(ts) => ts,
        None => {
            return NormalizedRecord::BadTimestamp {
                wmo_id,
                raw: raw_timestamp.to_string(),
            }
        }
    };

    let station_name = field(record, "station_name")
        .as_str()
        .map(str::to_string)
        .or_else(|| station.name.clone());

    // The export already reports wind in the warehouse units.
    let wind_unit = WindUnit::KmhKnots;

    let obs = Observation {
        station_sk: station.station_sk,
        wmo_id,
        station_name,
        timestamp,
        temp_07lt_c: normalize::coerce_json_number(sub_field(record, "m_0700ws", "tbk_1c2m_0700")),
        temp_13lt_c: normalize::coerce_json_number(sub_field(record, "m_1300ws", "tbk_1c2m_1300")),
        temp_18lt_c: normalize::coerce_json_number(sub_field(record, "m_1800ws", "tbk_1c2m_1800")),
        temp_avg_c: normalize::coerce_json_number(field(record, "tbk_avg")),
        temp_max_c: normalize::coerce_json_number(sub_field(record, "m_1800ws", "t_max_1c2m")),
        temp_min_c: normalize::coerce_json_number(sub_field(record, "m_1300ws", "t_min_1c2m")),
        rainfall_mm: normalize::coerce_json_number(sub_field(record, "m_0700ws", "rr_0700")),
        sunshine_h: normalize::coerce_json_number(sub_field(record, "m_0700ws", "ss_8")),
        weather_specific: normalize::coerce_json_text(sub_field(record, "m_0700ws", "cu_khusus")),
        pressure_mb: normalize::coerce_json_number(sub_field(record, "m_1800ws", "pp_qfe_0000")),
        rel_humidity_07lt_pc: normalize::coerce_json_number(sub_field(
            record, "m_0700ws", "rh_1c2m_0700",
        )),
        rel_humidity_13lt_pc: normalize::coerce_json_number(sub_field(
            record, "m_1300ws", "rh_1c2m_1300",
        )),
        rel_humidity_18lt_pc: normalize::coerce_json_number(sub_field(
            record, "m_1800ws", "rh_1c2m_1800",
        )),
        rel_humidity_avg_pc: normalize::coerce_json_number(field(record, "rh_avg")),
        wind_speed_avg_km_h: normalize::wind_avg_kmh(
            normalize::coerce_json_number(field(record, "ff_avg_km_jm")),
            wind_unit,
        ),
        wind_dir_max: normalize::coerce_json_number(field(record, "wd_ff_max")),
        wind_speed_max_knots: normalize::wind_max_knots(
            normalize::coerce_json_number(field(record, "ff_max")),
            wind_unit,
        ),
        wind_dir_cardinal: normalize::coerce_json_text(field(record, "wd_cardinal")),
        source_data: field(record, "source_data")
            .as_str()
            .map(str::to_string)
            .or_else(|| Some(source_label.to_string())),
        updated_at: Utc::now().naive_utc(),
    };

    NormalizedRecord::Accepted(Box::new(obs))
}

/// Normalizes a whole API batch against the pre-fetched station directory.
pub fn normalize_batch(
    records: &[Value],
    directory: &StationDirectory,
    source_label: &str,
) -> Vec<NormalizedRecord> {
    records
        .iter()
        .map(|r| normalize_record(r, directory, source_label))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
