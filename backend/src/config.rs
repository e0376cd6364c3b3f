//! Configuration management for the Stockroom back-office
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with STOCKROOM__ prefix

use chrono::NaiveDate;
use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{validate_tolerance, DiscrepancyPolicy};
use uuid::Uuid;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Reconciliation policy
    pub reconciliation: ReconciliationConfig,

    /// Report job parameters
    #[serde(default)]
    pub jobs: JobConfig,

    /// Log output
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconciliationConfig {
    /// Largest tolerated value difference between daily reports and raw data,
    /// in minor currency units
    pub discrepancy_tolerance: Decimal,
}

impl ReconciliationConfig {
    pub fn policy(&self) -> DiscrepancyPolicy {
        DiscrepancyPolicy::new(self.discrepancy_tolerance)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct JobConfig {
    /// Employee the generated reports are attributed to
    pub owner_id: Option<Uuid>,

    /// Day to report on; yesterday (UTC) when unset
    pub report_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCKROOM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("reconciliation.discrepancy_tolerance", "1000")?
            .set_default("log.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STOCKROOM__ prefix)
            .add_source(
                Environment::with_prefix("STOCKROOM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_tolerance(self.reconciliation.discrepancy_tolerance)
            .map_err(|msg| ConfigError::Message(msg.to_string()))?;
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message(
                "database.min_connections exceeds database.max_connections".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            discrepancy_tolerance: DiscrepancyPolicy::default().value_tolerance,
        }
    }
}
