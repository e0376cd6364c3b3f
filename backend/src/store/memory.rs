//! In-process store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{DailyReport, DateRange, Item, MonthlyRollup, Movement, ReportKind, Sale, ValuationSnapshot};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{LedgerStore, ReportStore, SalesSource};
use crate::error::{AppError, AppResult};

type ReportKey = (NaiveDate, ReportKind, Uuid);
type RollupKey = (NaiveDate, NaiveDate, ReportKind, Uuid);

#[derive(Default)]
struct MemoryState {
    items: HashMap<Uuid, Item>,
    movements: Vec<Movement>,
    sales: Vec<Sale>,
    daily_reports: HashMap<ReportKey, DailyReport>,
    valuations: HashMap<(Uuid, NaiveDate), ValuationSnapshot>,
    rollups: HashMap<RollupKey, MonthlyRollup>,
}

/// Store that keeps all state behind one async mutex, so every write is
/// serialized and readers see a consistent copy.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item, replacing any item with the same id
    pub async fn insert_item(&self, item: Item) {
        self.state.lock().await.items.insert(item.id, item);
    }

    /// Register a sale as the point-of-sale system would
    pub async fn insert_sale(&self, sale: Sale) {
        self.state.lock().await.sales.push(sale);
    }

    /// Append a movement as-is, bypassing the ledger and leaving item quantities alone
    pub async fn insert_movement(&self, movement: Movement) {
        self.state.lock().await.movements.push(movement);
    }

    pub async fn valuation(&self, item_id: Uuid, as_of_date: NaiveDate) -> Option<ValuationSnapshot> {
        self.state
            .lock()
            .await
            .valuations
            .get(&(item_id, as_of_date))
            .cloned()
    }

    pub async fn daily_report_count(&self) -> usize {
        self.state.lock().await.daily_reports.len()
    }

    pub async fn rollup_count(&self) -> usize {
        self.state.lock().await.rollups.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_item(&self, item_id: Uuid) -> AppResult<Item> {
        self.state
            .lock()
            .await
            .items
            .get(&item_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Item".to_string()))
    }

    async fn apply_movement<F>(&self, item_id: Uuid, build: F) -> AppResult<Movement>
    where
        F: FnOnce(&Item) -> AppResult<Movement> + Send + 'static,
    {
        let mut state = self.state.lock().await;
        let item = state
            .items
            .get(&item_id)
            .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        let movement = build(item)?;

        if let Some(item) = state.items.get_mut(&item_id) {
            item.quantity = movement.stock_after;
            item.updated_at = Utc::now();
        }
        state.movements.push(movement.clone());
        Ok(movement)
    }

    async fn movements_for_item(&self, item_id: Uuid) -> AppResult<Vec<Movement>> {
        Ok(self
            .state
            .lock()
            .await
            .movements
            .iter()
            .filter(|m| m.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn movements_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Movement>> {
        Ok(self
            .state
            .lock()
            .await
            .movements
            .iter()
            .filter(|m| m.created_at >= start && m.created_at < end)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SalesSource for MemoryStore {
    async fn completed_sales_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cashier_id: Option<Uuid>,
    ) -> AppResult<Vec<Sale>> {
        let mut sales: Vec<Sale> = self
            .state
            .lock()
            .await
            .sales
            .iter()
            .filter(|sale| sale.is_completed())
            .filter(|sale| sale.completed_at >= start && sale.completed_at < end)
            .filter(|sale| cashier_id.map_or(true, |cashier| sale.cashier_id == cashier))
            .cloned()
            .collect();
        sales.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));
        Ok(sales)
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn upsert_daily_report(&self, report: &DailyReport) -> AppResult<DailyReport> {
        let mut state = self.state.lock().await;
        let key = (report.subject_date, report.kind, report.owner_id);
        let mut stored = report.clone();
        if let Some(existing) = state.daily_reports.get(&key) {
            stored.id = existing.id;
        }
        state.daily_reports.insert(key, stored.clone());
        Ok(stored)
    }

    async fn find_daily_report(
        &self,
        subject_date: NaiveDate,
        kind: ReportKind,
        owner_id: Uuid,
    ) -> AppResult<Option<DailyReport>> {
        Ok(self
            .state
            .lock()
            .await
            .daily_reports
            .get(&(subject_date, kind, owner_id))
            .cloned())
    }

    async fn daily_reports_between(
        &self,
        period: DateRange,
        kind: ReportKind,
        owner_id: Uuid,
    ) -> AppResult<Vec<DailyReport>> {
        let mut reports: Vec<DailyReport> = self
            .state
            .lock()
            .await
            .daily_reports
            .values()
            .filter(|r| r.kind == kind && r.owner_id == owner_id && period.contains(r.subject_date))
            .cloned()
            .collect();
        reports.sort_by_key(|r| r.subject_date);
        Ok(reports)
    }

    async fn upsert_valuation(&self, snapshot: &ValuationSnapshot) -> AppResult<ValuationSnapshot> {
        self.state
            .lock()
            .await
            .valuations
            .insert((snapshot.item_id, snapshot.as_of_date), snapshot.clone());
        Ok(snapshot.clone())
    }

    async fn save_rollup(&self, rollup: &MonthlyRollup) -> AppResult<MonthlyRollup> {
        let mut state = self.state.lock().await;
        let key = (rollup.period.start, rollup.period.end, rollup.kind, rollup.owner_id);
        let mut stored = rollup.clone();
        if let Some(existing) = state.rollups.get(&key) {
            stored.id = existing.id;
        }
        state.rollups.insert(key, stored.clone());
        Ok(stored)
    }
}
