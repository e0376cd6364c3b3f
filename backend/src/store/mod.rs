//! Storage interfaces the services are written against
//!
//! `PgStore` is the production implementation. `MemoryStore` keeps everything
//! in process and backs the integration tests.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{DailyReport, DateRange, Item, MonthlyRollup, Movement, ReportKind, Sale, ValuationSnapshot};
use uuid::Uuid;

use crate::error::AppResult;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Items and their append-only movement ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_item(&self, item_id: Uuid) -> AppResult<Item>;

    /// Serialize against other writers of `item_id`, derive a movement from the
    /// item's current state with `build`, then persist the movement and set the
    /// item's quantity to `stock_after` as one unit. Nothing is written when
    /// `build` fails.
    async fn apply_movement<F>(&self, item_id: Uuid, build: F) -> AppResult<Movement>
    where
        F: FnOnce(&Item) -> AppResult<Movement> + Send + 'static;

    /// All movements of an item in append order
    async fn movements_for_item(&self, item_id: Uuid) -> AppResult<Vec<Movement>>;

    /// Store-wide movements with `start <= created_at < end`
    async fn movements_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Movement>>;
}

/// Read access to the point-of-sale records
#[async_trait]
pub trait SalesSource: Send + Sync {
    /// Completed sales with their lines, `start <= completed_at < end`,
    /// optionally limited to one cashier
    async fn completed_sales_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cashier_id: Option<Uuid>,
    ) -> AppResult<Vec<Sale>>;
}

/// Generated reports and snapshots
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert or replace the report for its `(subject_date, kind, owner_id)` key.
    /// A replaced report keeps its original id.
    async fn upsert_daily_report(&self, report: &DailyReport) -> AppResult<DailyReport>;

    async fn find_daily_report(
        &self,
        subject_date: NaiveDate,
        kind: ReportKind,
        owner_id: Uuid,
    ) -> AppResult<Option<DailyReport>>;

    /// Reports of `kind` for `owner_id` inside `period`, ordered by date
    async fn daily_reports_between(
        &self,
        period: DateRange,
        kind: ReportKind,
        owner_id: Uuid,
    ) -> AppResult<Vec<DailyReport>>;

    /// Insert or replace the snapshot for its `(item_id, as_of_date)` key
    async fn upsert_valuation(&self, snapshot: &ValuationSnapshot) -> AppResult<ValuationSnapshot>;

    /// Insert or replace the rollup for its `(period, kind, owner_id)` key
    async fn save_rollup(&self, rollup: &MonthlyRollup) -> AppResult<MonthlyRollup>;
}
