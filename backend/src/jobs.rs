//! Nightly report job: the day's reports, plus the monthly rollups at month end

use chrono::{Datelike, Duration, NaiveDate, Utc};
use shared::{DailyReport, DateRange, DiscrepancyPolicy, MonthlyRollup, ReportKind};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::{MonthlyRollupService, ReconciliationReporter};
use crate::store::{LedgerStore, ReportStore, SalesSource};

/// Outcome of one job run
#[derive(Debug)]
pub struct JobSummary {
    pub date: NaiveDate,
    pub stock_report: DailyReport,
    pub sales_report: DailyReport,
    /// Stock and sales rollups, only on the last day of a month
    pub rollups: Vec<MonthlyRollup>,
}

impl JobSummary {
    pub fn has_findings(&self) -> bool {
        !self.stock_report.is_balanced || self.rollups.iter().any(|r| r.has_discrepancy)
    }
}

#[derive(Clone)]
pub struct NightlyJob<S> {
    reporter: ReconciliationReporter<S>,
    rollups: MonthlyRollupService<S>,
}

impl<S> NightlyJob<S>
where
    S: LedgerStore + SalesSource + ReportStore + Clone,
{
    pub fn new(store: S, policy: DiscrepancyPolicy) -> Self {
        Self {
            reporter: ReconciliationReporter::new(store.clone()),
            rollups: MonthlyRollupService::new(store, policy),
        }
    }

    pub async fn run(&self, date: NaiveDate, owner_id: Uuid) -> AppResult<JobSummary> {
        tracing::info!(date = %date, owner_id = %owner_id, "Running nightly report job");

        let stock_report = self
            .reporter
            .build_daily(date, owner_id, ReportKind::Stock)
            .await?;
        let sales_report = self
            .reporter
            .build_daily(date, owner_id, ReportKind::Sales)
            .await?;

        let mut rollups = Vec::new();
        if is_month_end(date) {
            let period = DateRange::month_of(date)
                .ok_or_else(|| AppError::Internal(format!("No calendar month for {}", date)))?;
            for kind in [ReportKind::Stock, ReportKind::Sales] {
                rollups.push(self.rollups.build(period, kind, owner_id).await?);
            }
        }

        Ok(JobSummary {
            date,
            stock_report,
            sales_report,
            rollups,
        })
    }
}

pub fn is_month_end(date: NaiveDate) -> bool {
    (date + Duration::days(1)).month() != date.month()
}

/// The day a job reports on when none is configured
pub fn default_report_date() -> NaiveDate {
    Utc::now().date_naive() - Duration::days(1)
}
