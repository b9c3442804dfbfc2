/// FKLIM data warehouse loader.
///
/// Moves daily climatology (FKLIM) observations from two sources (the
/// bmkgsatu export API and Oracle CSV exports) into a PostgreSQL star
/// schema, keeping `(station_sk_id, data_timestamp)` unique in the fact
/// table, and recomputes the per-station availability summary tables the
/// dashboard reads.
///
/// Pipeline: source → `ingest::{api,csv}` (normalize + classify) →
/// `engine::apply_batch` (conditional writes via `store`) →
/// `availability::summarize` → summary tables.

pub mod availability;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod stations;
pub mod store;
