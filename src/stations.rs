/// Station reference directory.
///
/// Maps external WMO identifiers to the surrogate keys assigned by the
/// `dim_stations` dimension table. The dimension is maintained by a separate
/// metadata-ingestion process; this service only reads it, once per run,
/// and resolves every record in the batch against the in-memory map.

use std::collections::HashMap;

use postgres::Client;
use serde_json::Value;

use crate::model::EtlError;

/// One row of the station dimension, as seen by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRecord {
    pub station_sk: i32,
    pub wmo_id: String,
    pub name: Option<String>,
}

/// In-memory lookup table keyed by canonical WMO id string.
#[derive(Debug, Default)]
pub struct StationDirectory {
    by_wmo_id: HashMap<String, StationRecord>,
}

impl StationDirectory {
    /// Fetches the whole `dim_stations` table. Called once per run; record
    /// lookups afterwards are in-memory.
    pub fn load(client: &mut Client) -> Result<Self, EtlError> {
        let rows = client.query(
            "SELECT station_sk_id, wmo_id, name_stations FROM dim_stations",
            &[],
        )?;
        let mut by_wmo_id = HashMap::with_capacity(rows.len());
        for row in rows {
            let record = StationRecord {
                station_sk: row.get(0),
                wmo_id: canonical_id(row.get::<_, &str>(1)),
                name: row.get(2),
            };
            by_wmo_id.insert(record.wmo_id.clone(), record);
        }
        Ok(StationDirectory { by_wmo_id })
    }

    /// Builds a directory from in-memory triples. Used by tests and by
    /// callers that already hold the dimension rows.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (i32, String, Option<String>)>,
    {
        let by_wmo_id = records
            .into_iter()
            .map(|(station_sk, wmo_id, name)| {
                let wmo_id = canonical_id(&wmo_id);
                (
                    wmo_id.clone(),
                    StationRecord {
                        station_sk,
                        wmo_id,
                        name,
                    },
                )
            })
            .collect();
        StationDirectory { by_wmo_id }
    }

    /// Resolves a raw station identifier. `None` means the station is not in
    /// the dimension and the record should be counted as skipped.
    pub fn lookup(&self, raw_wmo_id: &str) -> Option<&StationRecord> {
        self.by_wmo_id.get(&canonical_id(raw_wmo_id))
    }

    pub fn len(&self) -> usize {
        self.by_wmo_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_wmo_id.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Identifier coercion
// ---------------------------------------------------------------------------

/// Canonical string form of a WMO id.
///
/// The export API is loose about this field's type, so ids arrive as
/// "96001", 96001 or 96001.0 depending on the upstream serializer. Trims
/// whitespace and drops an all-zero fractional part.
pub fn canonical_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((whole, frac)) = trimmed.split_once('.') {
        if !whole.is_empty()
            && !frac.is_empty()
            && whole.chars().all(|c| c.is_ascii_digit())
            && frac.chars().all(|c| c == '0')
        {
            return whole.to_string();
        }
    }
    trimmed.to_string()
}

/// Extracts a canonical WMO id from a JSON field. `None` when the field is
/// absent, null, or not a scalar.
pub fn canonical_id_from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let id = canonical_id(s);
            if id.is_empty() {
                None
            } else {
                Some(id)
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else {
                n.as_f64().map(|f| canonical_id(&f.to_string()))
            }
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
