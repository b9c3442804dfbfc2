/// Storage boundary for the observation fact table and the availability
/// summary tables.
///
/// The composite-key uniqueness invariant is enforced by the store's own
/// atomic conditional write (`ON CONFLICT` in the Postgres backend), never
/// by a read-then-write sequence; concurrent ingestion runs touching the
/// same key must not race. `store::memory` provides the same contract in
/// memory for tests and dry runs.

pub mod memory;
pub mod pg;

use crate::availability::{AvailabilityRow, Granularity};
use crate::model::Observation;

// ---------------------------------------------------------------------------
// Write policy
// ---------------------------------------------------------------------------

/// Conflict behaviour when a record's `(station_sk, timestamp)` key already
/// exists in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Leave the existing row untouched; report a duplicate skip.
    /// Used by the API ingest path.
    InsertIfAbsent,
    /// Overwrite all measured-parameter columns and `updated_at` with the
    /// new values. Used by the CSV re-ingest path.
    Overwrite,
}

/// What a single conditional write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Row inserted, or overwritten under `WritePolicy::Overwrite`.
    Written,
    /// Key already present under `WritePolicy::InsertIfAbsent`.
    DuplicateSkipped,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A failed store operation. Per-record write failures are isolated by the
/// engine (counted, run continues); failures on batch-level operations like
/// `load_all` are fatal to the run.
#[derive(Debug)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

impl From<postgres::Error> for StoreError {
    fn from(e: postgres::Error) -> Self {
        StoreError(e.to_string())
    }
}

impl From<StoreError> for crate::model::EtlError {
    fn from(e: StoreError) -> Self {
        crate::model::EtlError::DatabaseError(e.0)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Write/read access to the observation fact table.
pub trait ObservationStore {
    /// Applies one observation under the given policy as a single atomic
    /// conditional write on the composite key.
    fn write(&mut self, obs: &Observation, policy: WritePolicy)
        -> Result<WriteOutcome, StoreError>;

    /// Bulk read for the availability aggregator.
    fn load_all(&mut self) -> Result<Vec<Observation>, StoreError>;
}

/// Write access to the availability summary tables, keyed on
/// `(station_sk, period_id)`. Always upsert-overwrite: summaries are
/// materialized views, safe to rebuild in full.
pub trait SummaryStore {
    fn upsert(&mut self, granularity: Granularity, row: &AvailabilityRow)
        -> Result<(), StoreError>;
}
