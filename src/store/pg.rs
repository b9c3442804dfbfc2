/// PostgreSQL warehouse backend.
///
/// The conflict-on-key semantics live in the SQL: `ON CONFLICT ... DO
/// NOTHING` for insert-if-absent and `ON CONFLICT ... DO UPDATE` for
/// overwrite, both on the `(station_sk_id, data_timestamp)` composite key.
/// Each record is its own statement (and therefore its own transaction), so
/// a constraint violation on one row never aborts its siblings.

use postgres::{Client, NoTls};

use crate::availability::{AvailabilityRow, Granularity};
use crate::model::Observation;
use crate::store::{ObservationStore, StoreError, SummaryStore, WriteOutcome, WritePolicy};

// ---------------------------------------------------------------------------
// Fact table SQL
// ---------------------------------------------------------------------------

const FACT_COLUMNS: &str = "station_sk_id, wmo_id, name_station, data_timestamp, \
     temp_07lt_c, temp_13lt_c, temp_18lt_c, temp_avg_c, \
     temp_max_c, temp_min_c, rainfall_mm, sunshine_h, \
     weather_specific, pressure_mb, rel_humidity_07lt_pc, \
     rel_humidity_13lt_pc, rel_humidity_18lt_pc, rel_humidity_avg_pc, \
     wind_speed_avg_km_h, wind_dir_max, wind_speed_max_knots, wind_dir_cardinal, \
     source_data, updated_at";

const FACT_PLACEHOLDERS: &str = "$1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, \
     $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24";

/// Parameter columns rewritten on conflict under `WritePolicy::Overwrite`.
/// The key columns and provenance identity (wmo_id, name_station) stay.
const OVERWRITE_SET: &str = "temp_07lt_c = EXCLUDED.temp_07lt_c, \
     temp_13lt_c = EXCLUDED.temp_13lt_c, \
     temp_18lt_c = EXCLUDED.temp_18lt_c, \
     temp_avg_c = EXCLUDED.temp_avg_c, \
     temp_max_c = EXCLUDED.temp_max_c, \
     temp_min_c = EXCLUDED.temp_min_c, \
     rainfall_mm = EXCLUDED.rainfall_mm, \
     sunshine_h = EXCLUDED.sunshine_h, \
     weather_specific = EXCLUDED.weather_specific, \
     pressure_mb = EXCLUDED.pressure_mb, \
     rel_humidity_07lt_pc = EXCLUDED.rel_humidity_07lt_pc, \
     rel_humidity_13lt_pc = EXCLUDED.rel_humidity_13lt_pc, \
     rel_humidity_18lt_pc = EXCLUDED.rel_humidity_18lt_pc, \
     rel_humidity_avg_pc = EXCLUDED.rel_humidity_avg_pc, \
     wind_speed_avg_km_h = EXCLUDED.wind_speed_avg_km_h, \
     wind_dir_max = EXCLUDED.wind_dir_max, \
     wind_speed_max_knots = EXCLUDED.wind_speed_max_knots, \
     wind_dir_cardinal = EXCLUDED.wind_dir_cardinal, \
     source_data = EXCLUDED.source_data, \
     updated_at = EXCLUDED.updated_at";

// ---------------------------------------------------------------------------
// Summary table SQL
// ---------------------------------------------------------------------------

/// Availability column names in `model::PARAMETERS` order. The
/// `availability_wind_speed_avg_kmjam` spelling is a historical quirk of the
/// summary tables that the dashboard queries by name; do not "fix" it.
const AVAILABILITY_COLUMNS: [&str; 18] = [
    "availability_temp_07lt_c",
    "availability_temp_13lt_c",
    "availability_temp_18lt_c",
    "availability_temp_avg_c",
    "availability_temp_max_c",
    "availability_temp_min_c",
    "availability_rainfall_mm",
    "availability_sunshine_h",
    "availability_weather_specific",
    "availability_pressure_mb",
    "availability_rel_humidity_07lt_pc",
    "availability_rel_humidity_13lt_pc",
    "availability_rel_humidity_18lt_pc",
    "availability_rel_humidity_avg_pc",
    "availability_wind_speed_avg_kmjam",
    "availability_wind_dir_max",
    "availability_wind_speed_max_knots",
    "availability_wind_dir_cardinal",
];

fn summary_table(granularity: Granularity) -> (&'static str, &'static str) {
    match granularity {
        Granularity::Monthly => ("fact_fklim_availability_monthly", "time_month_id"),
        Granularity::Yearly => ("fact_fklim_availability_yearly", "time_year_id"),
    }
}

fn summary_upsert_sql(granularity: Granularity) -> String {
    let (table, period_col) = summary_table(granularity);
    let columns = AVAILABILITY_COLUMNS.join(", ");
    let placeholders: Vec<String> = (4..=21).map(|i| format!("${}", i)).collect();
    let updates: Vec<String> = AVAILABILITY_COLUMNS
        .iter()
        .map(|c| format!("{} = EXCLUDED.{}", c, c))
        .collect();
    format!(
        "INSERT INTO {} (station_sk_id, {}, percentage_available, {}) \
         VALUES ($1, $2, $3, {}) \
         ON CONFLICT (station_sk_id, {}) DO UPDATE SET \
         percentage_available = EXCLUDED.percentage_available, {}",
        table,
        period_col,
        columns,
        placeholders.join(", "),
        period_col,
        updates.join(", ")
    )
}

// ---------------------------------------------------------------------------
// Warehouse connection
// ---------------------------------------------------------------------------

/// One blocking connection to the warehouse, shared by the dimension read,
/// the fact writes, and the summary writes of a run.
pub struct PgWarehouse {
    client: Client,
}

impl PgWarehouse {
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::connect(url, NoTls)?;
        Ok(PgWarehouse { client })
    }

    /// Raw client access, used for the once-per-run dimension fetch.
    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }
}

impl ObservationStore for PgWarehouse {
    fn write(
        &mut self,
        obs: &Observation,
        policy: WritePolicy,
    ) -> Result<WriteOutcome, StoreError> {
        let sql = match policy {
            WritePolicy::InsertIfAbsent => format!(
                "INSERT INTO fact_data_fklim ({}) VALUES ({}) \
                 ON CONFLICT (station_sk_id, data_timestamp) DO NOTHING",
                FACT_COLUMNS, FACT_PLACEHOLDERS
            ),
            WritePolicy::Overwrite => format!(
                "INSERT INTO fact_data_fklim ({}) VALUES ({}) \
                 ON CONFLICT (station_sk_id, data_timestamp) DO UPDATE SET {}",
                FACT_COLUMNS, FACT_PLACEHOLDERS, OVERWRITE_SET
            ),
        };

        let affected = self.client.execute(
            &sql,
            &[
                &obs.station_sk,
                &obs.wmo_id,
                &obs.station_name,
                &obs.timestamp,
                &obs.temp_07lt_c,
                &obs.temp_13lt_c,
                &obs.temp_18lt_c,
                &obs.temp_avg_c,
                &obs.temp_max_c,
                &obs.temp_min_c,
                &obs.rainfall_mm,
                &obs.sunshine_h,
                &obs.weather_specific,
                &obs.pressure_mb,
                &obs.rel_humidity_07lt_pc,
                &obs.rel_humidity_13lt_pc,
                &obs.rel_humidity_18lt_pc,
                &obs.rel_humidity_avg_pc,
                &obs.wind_speed_avg_km_h,
                &obs.wind_dir_max,
                &obs.wind_speed_max_knots,
                &obs.wind_dir_cardinal,
                &obs.source_data,
                &obs.updated_at,
            ],
        )?;

        // DO NOTHING reports zero affected rows on a key collision.
        if affected == 0 {
            Ok(WriteOutcome::DuplicateSkipped)
        } else {
            Ok(WriteOutcome::Written)
        }
    }

    fn load_all(&mut self) -> Result<Vec<Observation>, StoreError> {
        let sql = format!(
            "SELECT {} FROM fact_data_fklim ORDER BY station_sk_id, data_timestamp",
            FACT_COLUMNS
        );
        let rows = self.client.query(&sql, &[])?;

        let mut observations = Vec::with_capacity(rows.len());
        for row in rows {
            observations.push(Observation {
                station_sk: row.get(0),
                wmo_id: row.get(1),
                station_name: row.get(2),
                timestamp: row.get(3),
                temp_07lt_c: row.get(4),
                temp_13lt_c: row.get(5),
                temp_18lt_c: row.get(6),
                temp_avg_c: row.get(7),
                temp_max_c: row.get(8),
                temp_min_c: row.get(9),
                rainfall_mm: row.get(10),
                sunshine_h: row.get(11),
                weather_specific: row.get(12),
                pressure_mb: row.get(13),
                rel_humidity_07lt_pc: row.get(14),
                rel_humidity_13lt_pc: row.get(15),
                rel_humidity_18lt_pc: row.get(16),
                rel_humidity_avg_pc: row.get(17),
                wind_speed_avg_km_h: row.get(18),
                wind_dir_max: row.get(19),
                wind_speed_max_knots: row.get(20),
                wind_dir_cardinal: row.get(21),
                source_data: row.get(22),
                updated_at: row.get(23),
            });
        }
        Ok(observations)
    }
}

impl SummaryStore for PgWarehouse {
    fn upsert(
        &mut self,
        granularity: Granularity,
        row: &AvailabilityRow,
    ) -> Result<(), StoreError> {
        let sql = summary_upsert_sql(granularity);

        let mut params: Vec<&(dyn postgres::types::ToSql + Sync)> =
            Vec::with_capacity(3 + row.per_parameter.len());
        params.push(&row.station_sk);
        params.push(&row.period_id);
        params.push(&row.overall);
        for value in &row.per_parameter {
            params.push(value);
        }

        self.client.execute(&sql, &params)?;
        Ok(())
    }
}
