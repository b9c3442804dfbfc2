/// Command-line entry point for the FKLIM warehouse loader.
///
/// One subcommand per scheduled job:
///   ingest-api <from> <to>      fetch from the export API, insert-if-absent
///   ingest-csv <file>           load an Oracle export, upsert-overwrite
///   availability <monthly|yearly>   rebuild a summary table
///   check-config                validate config and warehouse connectivity
///
/// Fatal conditions (unreachable API, unreachable warehouse, malformed
/// payload, bad config) print an operator-facing message and exit non-zero.
/// Every ingest run ends with the full counter summary, zeros included.

use std::env;
use std::path::Path;
use std::process;

use fklim_warehouse::availability::{self, Granularity};
use fklim_warehouse::config::Config;
use fklim_warehouse::engine;
use fklim_warehouse::ingest::{api, csv};
use fklim_warehouse::logging::{self, DataSource, LogLevel};
use fklim_warehouse::model::{BatchSummary, EtlError};
use fklim_warehouse::stations::StationDirectory;
use fklim_warehouse::store::pg::PgWarehouse;
use fklim_warehouse::store::{ObservationStore, SummaryStore, WritePolicy};

const DEFAULT_CONFIG_PATH: &str = "./fklim_warehouse.toml";

fn main() {
    dotenv::dotenv().ok();
    logging::init_logger(LogLevel::Info, None);

    let args: Vec<String> = env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("❌ {}", e);
        process::exit(1);
    }
}

fn config_path() -> String {
    env::var("FKLIM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

fn run(args: &[String]) -> Result<(), EtlError> {
    match args.get(1).map(String::as_str) {
        Some("ingest-api") => {
            let (from, to) = match (args.get(2), args.get(3)) {
                (Some(f), Some(t)) => (f.as_str(), t.as_str()),
                _ => {
                    print_usage();
                    return Err(EtlError::ConfigError(
                        "ingest-api needs <from> and <to> timestamps".to_string(),
                    ));
                }
            };
            ingest_api(from, to)
        }
        Some("ingest-csv") => {
            let file = match args.get(2) {
                Some(f) => f.as_str(),
                None => {
                    print_usage();
                    return Err(EtlError::ConfigError(
                        "ingest-csv needs a <file> argument".to_string(),
                    ));
                }
            };
            ingest_csv(Path::new(file))
        }
        Some("availability") => {
            let granularity = match args.get(2).map(String::as_str) {
                Some("monthly") => Granularity::Monthly,
                Some("yearly") => Granularity::Yearly,
                _ => {
                    print_usage();
                    return Err(EtlError::ConfigError(
                        "availability needs 'monthly' or 'yearly'".to_string(),
                    ));
                }
            };
            rebuild_availability(granularity)
        }
        Some("check-config") => check_config(),
        _ => {
            print_usage();
            Err(EtlError::ConfigError("missing or unknown subcommand".to_string()))
        }
    }
}

fn print_usage() {
    eprintln!("usage: fklim_warehouse <subcommand>");
    eprintln!("  ingest-api <from> <to>         e.g. 2025-08-06T00:00 2025-08-10T23:59");
    eprintln!("  ingest-csv <file>");
    eprintln!("  availability <monthly|yearly>");
    eprintln!("  check-config");
}

fn connect(config: &Config) -> Result<PgWarehouse, EtlError> {
    let url = config.database.resolve_url()?;
    PgWarehouse::connect(&url).map_err(EtlError::from)
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn ingest_api(from: &str, to: &str) -> Result<(), EtlError> {
    let config = Config::load(&config_path())?;
    let mut warehouse = connect(&config)?;

    let directory = StationDirectory::load(warehouse.client())?;
    println!("✅ Loaded {} stations from dim_stations", directory.len());

    println!("⏳ Fetching FKLIM records {} .. {} ...", from, to);
    let records = api::fetch_records(&config.api, from, to)?;
    println!("✅ Retrieved {} records from the export API", records.len());

    let normalized = api::normalize_batch(&records, &directory, &config.api.source_label);
    let summary = engine::apply_batch(
        &mut warehouse,
        &normalized,
        WritePolicy::InsertIfAbsent,
        DataSource::Api,
    );

    print_summary(&summary);
    logging::log_run_summary(DataSource::Api, &summary);
    Ok(())
}

fn ingest_csv(file: &Path) -> Result<(), EtlError> {
    let config = Config::load(&config_path())?;
    let wind_unit = config.csv.wind_unit()?;
    let mut warehouse = connect(&config)?;

    let directory = StationDirectory::load(warehouse.client())?;
    println!("✅ Loaded {} stations from dim_stations", directory.len());

    println!("⏳ Reading {} ...", file.display());
    let normalized = csv::read_file(file, &directory, wind_unit, &config.csv.source_label)?;
    println!("✅ Parsed {} rows", normalized.len());

    let summary = engine::apply_batch(
        &mut warehouse,
        &normalized,
        WritePolicy::Overwrite,
        DataSource::Csv,
    );

    print_summary(&summary);
    logging::log_run_summary(DataSource::Csv, &summary);
    Ok(())
}

fn rebuild_availability(granularity: Granularity) -> Result<(), EtlError> {
    let config = Config::load(&config_path())?;
    let mut warehouse = connect(&config)?;

    println!("⏳ Reading fact_data_fklim ...");
    let observations = warehouse.load_all()?;
    println!("✅ {} observations loaded", observations.len());

    let rows = availability::summarize(&observations, granularity);
    for row in &rows {
        warehouse.upsert(granularity, row)?;
    }
    println!(
        "✅ Upserted {} {:?} availability rows",
        rows.len(),
        granularity
    );
    Ok(())
}

fn check_config() -> Result<(), EtlError> {
    let path = config_path();
    let config = Config::load(&path)?;
    println!("✅ Config parsed from {}", path);
    println!("   API endpoint: {}", config.api.base_url);
    println!("   CSV wind unit: {}", config.csv.wind_unit);

    let mut warehouse = connect(&config)?;
    let directory = StationDirectory::load(warehouse.client())?;
    println!("✅ Warehouse reachable, {} stations in dim_stations", directory.len());
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!("✅ inserted                  : {}", summary.inserted);
    println!("⚠️ skipped (duplicate key)   : {}", summary.skipped_duplicate);
    println!("⚠️ skipped (unknown station) : {}", summary.skipped_unknown_station);
    println!("⚠️ rejected (bad timestamp)  : {}", summary.rejected_bad_timestamp);
    println!("❌ failed                    : {}", summary.failed);
}
