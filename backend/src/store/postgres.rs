//! PostgreSQL store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    DailyBreakdownEntry, DailyReport, DateRange, Inconsistency, Item, MonthlyRollup, Movement,
    MovementCategory, MovementKind, PaymentMethod, Reference, ReportKind, ReportPayload,
    ReportTotals, Sale, SaleLine, SaleStatus, ValuationMethod, ValuationSnapshot,
};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use super::{LedgerStore, ReportStore, SalesSource};
use crate::error::{AppError, AppResult};

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Apply pending migrations from `backend/migrations`
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }
}

const ITEM_COLUMNS: &str = "id, sku, name, quantity, cost, price, updated_at";

const MOVEMENT_COLUMNS: &str = "id, item_id, actor_id, kind, quantity, stock_before, stock_after, \
     unit_cost, unit_price, value_in, value_out, value_change, category, \
     reference_type, reference_id, notes, created_at";

const REPORT_COLUMNS: &str = "id, subject_date, owner_id, kind, total_count, total_value, \
     raw_payload, inconsistencies, is_balanced, generated_at";

/// Row for the items table
#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    sku: String,
    name: String,
    quantity: i64,
    cost: Decimal,
    price: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            sku: row.sku,
            name: row.name,
            quantity: row.quantity,
            cost: row.cost,
            price: row.price,
            updated_at: row.updated_at,
        }
    }
}

/// Row for the stock_movements table
#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    item_id: Uuid,
    actor_id: Uuid,
    kind: String,
    quantity: i64,
    stock_before: i64,
    stock_after: i64,
    unit_cost: Option<Decimal>,
    unit_price: Option<Decimal>,
    value_in: Decimal,
    value_out: Decimal,
    value_change: Decimal,
    category: String,
    reference_type: Option<String>,
    reference_id: Option<Uuid>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let kind: MovementKind = row
            .kind
            .parse()
            .map_err(|e| AppError::corrupt_row("stock_movements", e))?;
        let category: MovementCategory = row
            .category
            .parse()
            .map_err(|e| AppError::corrupt_row("stock_movements", e))?;

        Ok(Movement {
            id: row.id,
            item_id: row.item_id,
            actor_id: row.actor_id,
            kind,
            quantity: row.quantity,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
            unit_cost: row.unit_cost,
            unit_price: row.unit_price,
            value_in: row.value_in,
            value_out: row.value_out,
            value_change: row.value_change,
            category,
            reference: Reference::from_parts(row.reference_type.as_deref(), row.reference_id),
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    number: String,
    cashier_id: Uuid,
    status: String,
    payment_method: String,
    total_amount: Decimal,
    completed_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SaleLineRow {
    id: Uuid,
    sale_id: Uuid,
    item_id: Uuid,
    quantity: i64,
    unit_price: Decimal,
}

#[derive(Debug, FromRow)]
struct DailyReportRow {
    id: Uuid,
    subject_date: NaiveDate,
    owner_id: Uuid,
    kind: String,
    total_count: i64,
    total_value: Decimal,
    raw_payload: Json<ReportPayload>,
    inconsistencies: Json<Vec<Inconsistency>>,
    is_balanced: bool,
    generated_at: DateTime<Utc>,
}

impl TryFrom<DailyReportRow> for DailyReport {
    type Error = AppError;

    fn try_from(row: DailyReportRow) -> Result<Self, Self::Error> {
        let kind: ReportKind = row
            .kind
            .parse()
            .map_err(|e| AppError::corrupt_row("daily_reports", e))?;

        Ok(DailyReport {
            id: row.id,
            subject_date: row.subject_date,
            owner_id: row.owner_id,
            kind,
            totals: ReportTotals::new(row.total_count, row.total_value),
            payload: row.raw_payload.0,
            inconsistencies: row.inconsistencies.0,
            is_balanced: row.is_balanced,
            generated_at: row.generated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ValuationRow {
    item_id: Uuid,
    as_of_date: NaiveDate,
    quantity_on_hand: i64,
    unit_cost: Decimal,
    unit_price: Decimal,
    cost_value: Decimal,
    market_value: Decimal,
    profit: Decimal,
    margin_pct: Decimal,
    valuation_method: String,
}

impl TryFrom<ValuationRow> for ValuationSnapshot {
    type Error = AppError;

    fn try_from(row: ValuationRow) -> Result<Self, Self::Error> {
        let valuation_method: ValuationMethod = row
            .valuation_method
            .parse()
            .map_err(|e| AppError::corrupt_row("valuation_snapshots", e))?;

        Ok(ValuationSnapshot {
            item_id: row.item_id,
            as_of_date: row.as_of_date,
            quantity_on_hand: row.quantity_on_hand,
            unit_cost: row.unit_cost,
            unit_price: row.unit_price,
            cost_value: row.cost_value,
            market_value: row.market_value,
            profit: row.profit,
            margin_pct: row.margin_pct,
            valuation_method,
        })
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn get_item(&self, item_id: Uuid) -> AppResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        Ok(row.into())
    }

    async fn apply_movement<F>(&self, item_id: Uuid, build: F) -> AppResult<Movement>
    where
        F: FnOnce(&Item) -> AppResult<Movement> + Send + 'static,
    {
        let mut tx = self.db.begin().await?;

        // Row lock: concurrent writers for this item queue here
        let item: Item = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items WHERE id = $1 FOR UPDATE",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?
        .into();

        let movement = build(&item)?;

        // Return the row as stored so amounts carry the column scale
        let stored = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            INSERT INTO stock_movements (
                id, item_id, actor_id, kind, quantity, stock_before, stock_after,
                unit_cost, unit_price, value_in, value_out, value_change, category,
                reference_type, reference_id, notes, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(movement.id)
        .bind(movement.item_id)
        .bind(movement.actor_id)
        .bind(movement.kind.as_str())
        .bind(movement.quantity)
        .bind(movement.stock_before)
        .bind(movement.stock_after)
        .bind(movement.unit_cost)
        .bind(movement.unit_price)
        .bind(movement.value_in)
        .bind(movement.value_out)
        .bind(movement.value_change)
        .bind(movement.category.as_str())
        .bind(movement.reference.as_ref().map(Reference::type_str))
        .bind(movement.reference.as_ref().map(Reference::id))
        .bind(&movement.notes)
        .bind(movement.created_at)
        .fetch_one(&mut *tx)
        .await?;
        let stored = Movement::try_from(stored)?;

        sqlx::query("UPDATE items SET quantity = $1, updated_at = NOW() WHERE id = $2")
            .bind(stored.stock_after)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(stored)
    }

    async fn movements_for_item(&self, item_id: Uuid) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {} FROM stock_movements WHERE item_id = $1 ORDER BY seq",
            MOVEMENT_COLUMNS
        ))
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Movement::try_from).collect()
    }

    async fn movements_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {} FROM stock_movements WHERE created_at >= $1 AND created_at < $2 ORDER BY seq",
            MOVEMENT_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Movement::try_from).collect()
    }
}

#[async_trait]
impl SalesSource for PgStore {
    async fn completed_sales_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cashier_id: Option<Uuid>,
    ) -> AppResult<Vec<Sale>> {
        let headers = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT id, number, cashier_id, status, payment_method, total_amount, completed_at
            FROM sales
            WHERE status = 'completed'
              AND completed_at >= $1 AND completed_at < $2
              AND ($3::uuid IS NULL OR cashier_id = $3)
            ORDER BY completed_at, number
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(cashier_id)
        .fetch_all(&self.db)
        .await?;

        let sale_ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let lines = sqlx::query_as::<_, SaleLineRow>(
            r#"
            SELECT id, sale_id, item_id, quantity, unit_price
            FROM sale_lines
            WHERE sale_id = ANY($1)
            ORDER BY sale_id, line_no
            "#,
        )
        .bind(&sale_ids[..])
        .fetch_all(&self.db)
        .await?;

        let mut lines_by_sale: HashMap<Uuid, Vec<SaleLine>> = HashMap::new();
        for line in lines {
            lines_by_sale.entry(line.sale_id).or_default().push(SaleLine {
                id: line.id,
                sale_id: line.sale_id,
                item_id: line.item_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        headers
            .into_iter()
            .map(|h| {
                let status: SaleStatus = h
                    .status
                    .parse()
                    .map_err(|e| AppError::corrupt_row("sales", e))?;
                let payment_method: PaymentMethod = h
                    .payment_method
                    .parse()
                    .map_err(|e| AppError::corrupt_row("sales", e))?;
                Ok(Sale {
                    lines: lines_by_sale.remove(&h.id).unwrap_or_default(),
                    id: h.id,
                    number: h.number,
                    cashier_id: h.cashier_id,
                    status,
                    payment_method,
                    total_amount: h.total_amount,
                    completed_at: h.completed_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn upsert_daily_report(&self, report: &DailyReport) -> AppResult<DailyReport> {
        let row = sqlx::query_as::<_, DailyReportRow>(&format!(
            r#"
            INSERT INTO daily_reports (
                id, subject_date, owner_id, kind, total_count, total_value,
                raw_payload, inconsistencies, is_balanced, generated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (subject_date, kind, owner_id) DO UPDATE SET
                total_count = EXCLUDED.total_count,
                total_value = EXCLUDED.total_value,
                raw_payload = EXCLUDED.raw_payload,
                inconsistencies = EXCLUDED.inconsistencies,
                is_balanced = EXCLUDED.is_balanced,
                generated_at = EXCLUDED.generated_at
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(report.id)
        .bind(report.subject_date)
        .bind(report.owner_id)
        .bind(report.kind.as_str())
        .bind(report.totals.count)
        .bind(report.totals.value)
        .bind(Json(&report.payload))
        .bind(Json(&report.inconsistencies))
        .bind(report.is_balanced)
        .bind(report.generated_at)
        .fetch_one(&self.db)
        .await?;

        row.try_into()
    }

    async fn find_daily_report(
        &self,
        subject_date: NaiveDate,
        kind: ReportKind,
        owner_id: Uuid,
    ) -> AppResult<Option<DailyReport>> {
        let row = sqlx::query_as::<_, DailyReportRow>(&format!(
            "SELECT {} FROM daily_reports WHERE subject_date = $1 AND kind = $2 AND owner_id = $3",
            REPORT_COLUMNS
        ))
        .bind(subject_date)
        .bind(kind.as_str())
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(DailyReport::try_from).transpose()
    }

    async fn daily_reports_between(
        &self,
        period: DateRange,
        kind: ReportKind,
        owner_id: Uuid,
    ) -> AppResult<Vec<DailyReport>> {
        let rows = sqlx::query_as::<_, DailyReportRow>(&format!(
            r#"
            SELECT {} FROM daily_reports
            WHERE subject_date BETWEEN $1 AND $2 AND kind = $3 AND owner_id = $4
            ORDER BY subject_date
            "#,
            REPORT_COLUMNS
        ))
        .bind(period.start)
        .bind(period.end)
        .bind(kind.as_str())
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(DailyReport::try_from).collect()
    }

    async fn upsert_valuation(&self, snapshot: &ValuationSnapshot) -> AppResult<ValuationSnapshot> {
        let row = sqlx::query_as::<_, ValuationRow>(
            r#"
            INSERT INTO valuation_snapshots (
                item_id, as_of_date, quantity_on_hand, unit_cost, unit_price,
                cost_value, market_value, profit, margin_pct, valuation_method
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (item_id, as_of_date) DO UPDATE SET
                quantity_on_hand = EXCLUDED.quantity_on_hand,
                unit_cost = EXCLUDED.unit_cost,
                unit_price = EXCLUDED.unit_price,
                cost_value = EXCLUDED.cost_value,
                market_value = EXCLUDED.market_value,
                profit = EXCLUDED.profit,
                margin_pct = EXCLUDED.margin_pct,
                valuation_method = EXCLUDED.valuation_method,
                updated_at = NOW()
            RETURNING item_id, as_of_date, quantity_on_hand, unit_cost, unit_price,
                      cost_value, market_value, profit, margin_pct, valuation_method
            "#,
        )
        .bind(snapshot.item_id)
        .bind(snapshot.as_of_date)
        .bind(snapshot.quantity_on_hand)
        .bind(snapshot.unit_cost)
        .bind(snapshot.unit_price)
        .bind(snapshot.cost_value)
        .bind(snapshot.market_value)
        .bind(snapshot.profit)
        .bind(snapshot.margin_pct)
        .bind(snapshot.valuation_method.as_str())
        .fetch_one(&self.db)
        .await?;

        row.try_into()
    }

    async fn save_rollup(&self, rollup: &MonthlyRollup) -> AppResult<MonthlyRollup> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO monthly_rollups (
                id, period_start, period_end, kind, owner_id,
                total_count, total_value, reported_count, reported_value,
                recomputed_count, recomputed_value, has_discrepancy,
                daily_breakdown, missing_days, generated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (period_start, period_end, kind, owner_id) DO UPDATE SET
                total_count = EXCLUDED.total_count,
                total_value = EXCLUDED.total_value,
                reported_count = EXCLUDED.reported_count,
                reported_value = EXCLUDED.reported_value,
                recomputed_count = EXCLUDED.recomputed_count,
                recomputed_value = EXCLUDED.recomputed_value,
                has_discrepancy = EXCLUDED.has_discrepancy,
                daily_breakdown = EXCLUDED.daily_breakdown,
                missing_days = EXCLUDED.missing_days,
                generated_at = EXCLUDED.generated_at
            RETURNING id
            "#,
        )
        .bind(rollup.id)
        .bind(rollup.period.start)
        .bind(rollup.period.end)
        .bind(rollup.kind.as_str())
        .bind(rollup.owner_id)
        .bind(rollup.totals.count)
        .bind(rollup.totals.value)
        .bind(rollup.reported_totals.count)
        .bind(rollup.reported_totals.value)
        .bind(rollup.recomputed_totals.count)
        .bind(rollup.recomputed_totals.value)
        .bind(rollup.has_discrepancy)
        .bind(Json::<&Vec<DailyBreakdownEntry>>(&rollup.daily_breakdown))
        .bind(&rollup.missing_days[..])
        .bind(rollup.generated_at)
        .fetch_one(&self.db)
        .await?;

        Ok(MonthlyRollup {
            id,
            ..rollup.clone()
        })
    }
}
