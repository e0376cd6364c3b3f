//! Monthly rollup service

use shared::{
    daily_sales_totals, daily_stock_totals, DateRange, DiscrepancyPolicy, MonthlyRollup, ReportKind,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, ReportStore, SalesSource};

/// Monthly rollup service
#[derive(Clone)]
pub struct MonthlyRollupService<S> {
    store: S,
    policy: DiscrepancyPolicy,
}

impl<S> MonthlyRollupService<S>
where
    S: LedgerStore + SalesSource + ReportStore,
{
    pub fn new(store: S, policy: DiscrepancyPolicy) -> Self {
        Self { store, policy }
    }

    /// Sum the owner's daily reports for `period` and check them against raw data.
    ///
    /// Stock totals are recomputed from all movements in the period, since
    /// movements are not partitioned by owner. Sales totals are recomputed from
    /// the owner's completed sales. Daily reports are never modified; days
    /// listed in `missing_days` are left for the caller to regenerate.
    pub async fn build(
        &self,
        period: DateRange,
        kind: ReportKind,
        owner_id: Uuid,
    ) -> AppResult<MonthlyRollup> {
        let reports = self
            .store
            .daily_reports_between(period, kind, owner_id)
            .await?;

        let (start, end) = period.utc_bounds();
        let raw_by_day = match kind {
            ReportKind::Stock => daily_stock_totals(&self.store.movements_between(start, end).await?)?,
            ReportKind::Sales => daily_sales_totals(
                &self
                    .store
                    .completed_sales_between(start, end, Some(owner_id))
                    .await?,
            )?,
        };

        let rollup =
            MonthlyRollup::assemble(period, kind, owner_id, &reports, &raw_by_day, &self.policy)?;

        if rollup.has_discrepancy {
            tracing::warn!(
                discrepancy_detected = true,
                period_start = %period.start,
                period_end = %period.end,
                kind = kind.as_str(),
                count_difference = rollup.count_difference,
                value_difference = %rollup.value_difference,
                reconstructed_days = rollup.reconstructed_days(),
                "Daily reports disagree with raw data; using recomputed totals"
            );
        }

        let stored = self.store.save_rollup(&rollup).await?;

        tracing::info!(
            period_start = %period.start,
            period_end = %period.end,
            kind = kind.as_str(),
            reports = reports.len(),
            count = stored.totals.count,
            value = %stored.totals.value,
            "Generated monthly rollup"
        );

        Ok(stored)
    }

    /// Rollup for a calendar month
    pub async fn build_month(
        &self,
        year: i32,
        month: u32,
        kind: ReportKind,
        owner_id: Uuid,
    ) -> AppResult<MonthlyRollup> {
        let period = DateRange::month(year, month).ok_or_else(|| AppError::Validation {
            field: "month".to_string(),
            message: format!("{}-{} is not a valid month", year, month),
        })?;
        self.build(period, kind, owner_id).await
    }
}
