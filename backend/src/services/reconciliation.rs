//! Reconciliation reporter: daily sales and stock reports with the
//! sale-line/movement cross-check

use chrono::NaiveDate;
use shared::{day_bounds, DailyReport, ReportKind};
use uuid::Uuid;

use crate::error::AppResult;
use crate::store::{LedgerStore, ReportStore, SalesSource};

/// Daily report generator
#[derive(Clone)]
pub struct ReconciliationReporter<S> {
    store: S,
}

impl<S> ReconciliationReporter<S>
where
    S: LedgerStore + SalesSource + ReportStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Build the `(date, owner, kind)` report and store it, replacing any
    /// earlier report for the same key.
    ///
    /// Sales reports cover the owner's own completed sales. Stock reports are
    /// store-wide: every movement of the day, checked against every completed
    /// sale of the day regardless of cashier.
    pub async fn build_daily(
        &self,
        date: NaiveDate,
        owner_id: Uuid,
        kind: ReportKind,
    ) -> AppResult<DailyReport> {
        let (start, end) = day_bounds(date);

        let report = match kind {
            ReportKind::Sales => {
                let sales = self
                    .store
                    .completed_sales_between(start, end, Some(owner_id))
                    .await?;
                tracing::debug!(date = %date, owner_id = %owner_id, sales = sales.len(), "Aggregating sales");
                DailyReport::sales(date, owner_id, &sales)?
            }
            ReportKind::Stock => {
                let movements = self.store.movements_between(start, end).await?;
                let sales = self.store.completed_sales_between(start, end, None).await?;
                tracing::debug!(
                    date = %date,
                    movements = movements.len(),
                    sales = sales.len(),
                    "Aggregating stock movements"
                );
                DailyReport::stock(date, owner_id, &movements, &sales)?
            }
        };

        if !report.is_balanced {
            tracing::warn!(
                date = %date,
                inconsistencies = report.inconsistencies.len(),
                "Sales and stock records disagree"
            );
            for inconsistency in &report.inconsistencies {
                tracing::warn!(
                    sale_id = %inconsistency.sale_id,
                    sale_line_id = %inconsistency.sale_line_id,
                    "{}",
                    inconsistency.explanation
                );
            }
        }

        let stored = self.store.upsert_daily_report(&report).await?;

        tracing::info!(
            date = %date,
            kind = kind.as_str(),
            owner_id = %owner_id,
            count = stored.totals.count,
            value = %stored.totals.value,
            is_balanced = stored.is_balanced,
            "Generated daily report"
        );

        Ok(stored)
    }

    /// Build the daily reports for every day of `period` in order
    pub async fn build_range(
        &self,
        period: shared::DateRange,
        owner_id: Uuid,
        kind: ReportKind,
    ) -> AppResult<Vec<DailyReport>> {
        let mut reports = Vec::with_capacity(period.num_days() as usize);
        for date in period.days() {
            reports.push(self.build_daily(date, owner_id, kind).await?);
        }
        Ok(reports)
    }
}
