/// In-memory store with the same conflict-on-key contract as the Postgres
/// backend. Used by the integration tests (no warehouse needed) and handy
/// for dry-running an ingest against an empty store.
///
/// Supports injected per-key write failures so tests can exercise the
/// engine's partial-batch isolation.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;

use crate::availability::{AvailabilityRow, Granularity};
use crate::model::Observation;
use crate::store::{ObservationStore, StoreError, SummaryStore, WriteOutcome, WritePolicy};

type Key = (i32, NaiveDateTime);

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: BTreeMap<Key, Observation>,
    fail_keys: HashSet<Key>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write for this key fail, simulating a constraint
    /// violation or transient store fault on that row.
    pub fn fail_writes_for(&mut self, station_sk: i32, timestamp: NaiveDateTime) {
        self.fail_keys.insert((station_sk, timestamp));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, station_sk: i32, timestamp: NaiveDateTime) -> Option<&Observation> {
        self.rows.get(&(station_sk, timestamp))
    }

    /// All rows in key order. Test helper for state comparisons.
    pub fn snapshot(&self) -> Vec<Observation> {
        self.rows.values().cloned().collect()
    }
}

impl ObservationStore for MemoryStore {
    fn write(
        &mut self,
        obs: &Observation,
        policy: WritePolicy,
    ) -> Result<WriteOutcome, StoreError> {
        let key = obs.key();
        if self.fail_keys.contains(&key) {
            return Err(StoreError(format!(
                "injected write failure for station {} at {}",
                key.0, key.1
            )));
        }

        match policy {
            WritePolicy::InsertIfAbsent => {
                if self.rows.contains_key(&key) {
                    Ok(WriteOutcome::DuplicateSkipped)
                } else {
                    self.rows.insert(key, obs.clone());
                    Ok(WriteOutcome::Written)
                }
            }
            WritePolicy::Overwrite => {
                self.rows.insert(key, obs.clone());
                Ok(WriteOutcome::Written)
            }
        }
    }

    fn load_all(&mut self) -> Result<Vec<Observation>, StoreError> {
        Ok(self.rows.values().cloned().collect())
    }
}

/// In-memory availability summary table.
#[derive(Debug, Default)]
pub struct MemorySummaryStore {
    rows: BTreeMap<(Granularity, i32, i32), AvailabilityRow>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn get(
        &self,
        granularity: Granularity,
        station_sk: i32,
        period_id: i32,
    ) -> Option<&AvailabilityRow> {
        self.rows.get(&(granularity, station_sk, period_id))
    }
}

impl SummaryStore for MemorySummaryStore {
    fn upsert(
        &mut self,
        granularity: Granularity,
        row: &AvailabilityRow,
    ) -> Result<(), StoreError> {
        self.rows
            .insert((granularity, row.station_sk, row.period_id), row.clone());
        Ok(())
    }
}
