/// Source-specific ingestion paths.
///
/// Both paths end in the same place: a `Vec<NormalizedRecord>` ready for
/// `engine::apply_batch`. Sources differ in transport, field naming, and
/// wind units; none of that survives past this module.
///
/// Submodules:
/// - `api`: bmkgsatu export API (JSON, nested time-of-day sub-objects).
/// - `csv`: Oracle view exports (flat CSV, m/s wind speeds).

pub mod api;
pub mod csv;
