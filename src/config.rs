/// Runtime configuration for the warehouse loader.
///
/// All credentials and endpoints live in a TOML file (see
/// `fklim_warehouse.toml` at the repo root) plus a `DATABASE_URL`
/// environment variable loaded via dotenv. Components receive the parsed
/// structure explicitly; there is no process-wide mutable configuration.

use std::env;
use std::fs;

use serde::Deserialize;

use crate::model::{EtlError, WindUnit};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub csv: CsvConfig,
}

/// bmkgsatu export API endpoint and request parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Export endpoint, e.g. "http://172.19.1.35:11091/db/bmkgsatu/@export_data".
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_type_name")]
    pub type_name: String,
    #[serde(default = "default_fdih_type")]
    pub fdih_type: String,
    /// `_size` request parameter; effectively "everything in range".
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Coarse overall timeout on the fetch. The upstream export is slow for
    /// wide date ranges, hence the generous default.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_source_label")]
    pub source_label: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Optional inline connection string; `DATABASE_URL` wins when set.
    pub url: Option<String>,
}

/// Oracle CSV export settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvConfig {
    /// Wind speed unit the export writes: "m/s" or "km/h+knots".
    #[serde(default = "default_wind_unit")]
    pub wind_unit: String,
    #[serde(default = "default_csv_source_label")]
    pub source_label: String,
}

impl Default for CsvConfig {
    fn default() -> Self {
        CsvConfig {
            wind_unit: default_wind_unit(),
            source_label: default_csv_source_label(),
        }
    }
}

fn default_type_name() -> String {
    "Fdih".to_string()
}

fn default_fdih_type() -> String {
    "Fklim".to_string()
}

fn default_page_size() -> u64 {
    10_000_000
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_api_source_label() -> String {
    "bmkgsatu".to_string()
}

fn default_wind_unit() -> String {
    "m/s".to_string()
}

fn default_csv_source_label() -> String {
    "oracle_csv".to_string()
}

impl Config {
    pub fn load(path: &str) -> Result<Config, EtlError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| EtlError::ConfigError(format!("cannot read {}: {}", path, e)))?;
        toml::from_str(&raw)
            .map_err(|e| EtlError::ConfigError(format!("cannot parse {}: {}", path, e)))
    }
}

impl DatabaseConfig {
    /// Connection string, preferring `DATABASE_URL` over the TOML value.
    pub fn resolve_url(&self) -> Result<String, EtlError> {
        if let Ok(url) = env::var("DATABASE_URL") {
            if !url.is_empty() {
                return Ok(url);
            }
        }
        self.url.clone().ok_or_else(|| {
            EtlError::ConfigError(
                "no database URL: set DATABASE_URL or [database].url".to_string(),
            )
        })
    }
}

impl CsvConfig {
    pub fn wind_unit(&self) -> Result<WindUnit, EtlError> {
        match self.wind_unit.as_str() {
            "m/s" | "ms" => Ok(WindUnit::MetersPerSecond),
            "km/h+knots" | "kmh+knots" => Ok(WindUnit::KmhKnots),
            other => Err(EtlError::ConfigError(format!(
                "unknown wind unit '{}' (expected \"m/s\" or \"km/h+knots\")",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [api]
        base_url = "http://warehouse.example/@export_data"
        username = "integrasi"
        password = "secret"
    "#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.api.type_name, "Fdih");
        assert_eq!(config.api.fdih_type, "Fklim");
        assert_eq!(config.api.timeout_secs, 600);
        assert_eq!(config.api.source_label, "bmkgsatu");
        assert_eq!(config.csv.source_label, "oracle_csv");
        assert_eq!(config.csv.wind_unit().unwrap(), WindUnit::MetersPerSecond);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_wind_unit_override() {
        let raw = format!("{}\n[csv]\nwind_unit = \"km/h+knots\"", MINIMAL);
        let config: Config = toml::from_str(&raw).unwrap();
        assert_eq!(config.csv.wind_unit().unwrap(), WindUnit::KmhKnots);
    }

    #[test]
    fn test_unknown_wind_unit_is_a_config_error() {
        let csv = CsvConfig {
            wind_unit: "furlongs".to_string(),
            source_label: default_csv_source_label(),
        };
        assert!(csv.wind_unit().is_err());
    }
}
