//! Stockroom nightly report job
//!
//! Builds the day's stock and sales reports and, on the last day of a month,
//! the monthly rollups.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use stockroom::{
    jobs::{default_report_date, NightlyJob},
    store::PgStore,
    Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stockroom=debug,stockroom_jobs=debug,sqlx=warn".into());
    if config.log.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Stockroom report job");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    let store = PgStore::new(db_pool);

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        store.migrate().await?;
        tracing::info!("Migrations completed");
    }

    let date = config.jobs.report_date.unwrap_or_else(default_report_date);
    let owner_id = config.jobs.owner_id.unwrap_or_else(Uuid::nil);

    let job = NightlyJob::new(store, config.reconciliation.policy());
    let summary = match job.run(date, owner_id).await {
        Ok(summary) => summary,
        Err(err) => {
            tracing::error!(code = err.code(), date = %date, "Report job failed: {}", err);
            return Err(err.into());
        }
    };

    if summary.has_findings() {
        tracing::warn!(
            date = %summary.date,
            inconsistencies = summary.stock_report.inconsistencies.len(),
            rollup_discrepancies = summary.rollups.iter().filter(|r| r.has_discrepancy).count(),
            "Report job finished with findings"
        );
    } else {
        tracing::info!(date = %summary.date, rollups = summary.rollups.len(), "Report job finished");
    }

    Ok(())
}
