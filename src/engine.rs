/// Upsert engine: applies a batch of classified records to the observation
/// store while preserving the composite-key uniqueness invariant.
///
/// Record-level problems are tallied, never propagated: one bad row must
/// not take down its siblings. The store's own conditional write handles
/// cross-run conflicts; this module only deduplicates within the batch.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::logging::{self, DataSource};
use crate::model::{BatchSummary, NormalizedRecord};
use crate::store::{ObservationStore, WriteOutcome, WritePolicy};

/// Applies one batch under the given policy and returns the counter summary.
///
/// In-batch deduplication rule: the first occurrence of a key in input order
/// wins; later rows with the same `(station_sk, timestamp)` are counted as
/// `skipped_duplicate` without touching the store. Applying the same batch
/// twice under `InsertIfAbsent` leaves the store unchanged the second time.
pub fn apply_batch<S: ObservationStore>(
    store: &mut S,
    records: &[NormalizedRecord],
    policy: WritePolicy,
    source: DataSource,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let mut seen: HashSet<(i32, NaiveDateTime)> = HashSet::new();

    for record in records {
        match record {
            NormalizedRecord::UnknownStation { wmo_id } => {
                summary.skipped_unknown_station += 1;
                logging::warn(
                    source.clone(),
                    Some(wmo_id),
                    "skipped: station not found in dim_stations",
                );
            }
            NormalizedRecord::BadTimestamp { wmo_id, raw } => {
                summary.rejected_bad_timestamp += 1;
                logging::warn(
                    source.clone(),
                    Some(wmo_id),
                    &format!("rejected: unparseable timestamp '{}'", raw),
                );
            }
            NormalizedRecord::Accepted(obs) => {
                if !seen.insert(obs.key()) {
                    summary.skipped_duplicate += 1;
                    continue;
                }
                match store.write(obs, policy) {
                    Ok(WriteOutcome::Written) => summary.inserted += 1,
                    Ok(WriteOutcome::DuplicateSkipped) => summary.skipped_duplicate += 1,
                    Err(e) => {
                        summary.failed += 1;
                        logging::error(
                            DataSource::Database,
                            Some(&obs.wmo_id),
                            &format!("write failed for {}: {}", obs.timestamp, e),
                        );
                    }
                }
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Observation;
    use crate::store::memory::MemoryStore;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn accepted(station_sk: i32, day: u32, temp: f64) -> NormalizedRecord {
        let stamp = ts(day);
        NormalizedRecord::Accepted(Box::new(Observation {
            station_sk,
            wmo_id: format!("96{:03}", station_sk),
            station_name: None,
            timestamp: stamp,
            temp_07lt_c: Some(temp),
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
            source_data: Some("test".to_string()),
            updated_at: stamp,
        }))
    }

    fn temp_of(store: &MemoryStore, station_sk: i32, day: u32) -> Option<f64> {
        store.get(station_sk, ts(day)).unwrap().temp_07lt_c
    }

    #[test]
    fn test_insert_if_absent_counts_and_stores() {
        let mut store = MemoryStore::new();
        let batch = vec![accepted(1, 1, 24.0), accepted(1, 2, 25.0), accepted(2, 1, 26.0)];

        let summary = apply_batch(&mut store, &batch, WritePolicy::InsertIfAbsent, DataSource::Api);
        assert_eq!(summary.inserted, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_reapplying_batch_is_idempotent_under_insert_if_absent() {
        let mut store = MemoryStore::new();
        let batch = vec![accepted(1, 1, 24.0), accepted(1, 2, 25.0)];

        apply_batch(&mut store, &batch, WritePolicy::InsertIfAbsent, DataSource::Api);
        let first_state = store.snapshot();

        let second = apply_batch(&mut store, &batch, WritePolicy::InsertIfAbsent, DataSource::Api);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped_duplicate, 2);
        assert_eq!(store.snapshot(), first_state);
    }

    #[test]
    fn test_in_batch_duplicate_first_occurrence_wins() {
        let mut store = MemoryStore::new();
        // same key twice with different values, under both policies
        for policy in [WritePolicy::InsertIfAbsent, WritePolicy::Overwrite] {
            let mut s = MemoryStore::new();
            let batch = vec![accepted(1, 1, 24.0), accepted(1, 1, 99.0)];
            let summary = apply_batch(&mut s, &batch, policy, DataSource::Csv);
            assert_eq!(summary.inserted, 1);
            assert_eq!(summary.skipped_duplicate, 1);
            assert_eq!(temp_of(&s, 1, 1), Some(24.0), "first occurrence must win");
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_overwrite_replaces_existing_values() {
        let mut store = MemoryStore::new();
        apply_batch(
            &mut store,
            &[accepted(1, 1, 24.0)],
            WritePolicy::InsertIfAbsent,
            DataSource::Api,
        );

        let summary = apply_batch(
            &mut store,
            &[accepted(1, 1, 30.5)],
            WritePolicy::Overwrite,
            DataSource::Csv,
        );
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.skipped_duplicate, 0);
        assert_eq!(temp_of(&store, 1, 1), Some(30.5));
        assert_eq!(store.len(), 1, "uniqueness invariant holds after overwrite");
    }

    #[test]
    fn test_unknown_station_and_bad_timestamp_are_counted_not_fatal() {
        let mut store = MemoryStore::new();
        let batch = vec![
            accepted(1, 1, 24.0),
            NormalizedRecord::UnknownStation {
                wmo_id: "99999".to_string(),
            },
            NormalizedRecord::BadTimestamp {
                wmo_id: "96001".to_string(),
                raw: "garbage".to_string(),
            },
            accepted(2, 1, 26.0),
        ];

        let summary = apply_batch(&mut store, &batch, WritePolicy::InsertIfAbsent, DataSource::Api);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.skipped_unknown_station, 1);
        assert_eq!(summary.rejected_bad_timestamp, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_write_failure_isolated_from_sibling_rows() {
        let mut store = MemoryStore::new();
        store.fail_writes_for(1, ts(3));

        // record 3 of 5 fails; 1, 2, 4, 5 must land
        let batch: Vec<_> = (1..=5).map(|d| accepted(1, d, d as f64)).collect();
        let summary = apply_batch(&mut store, &batch, WritePolicy::InsertIfAbsent, DataSource::Api);

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.inserted, 4);
        assert_eq!(store.len(), 4);
        for day in [1, 2, 4, 5] {
            assert!(store.get(1, ts(day)).is_some(), "day {} should be present", day);
        }
        assert!(store.get(1, ts(3)).is_none());
    }
}
