//! Monthly rollup of daily reports with a raw-data correctness check

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DailyReport, ReportKind, ReportTotals, ValuationError};
use crate::types::DateRange;

/// Default material difference between reported and recomputed values,
/// in minor currency units
pub const DEFAULT_VALUE_TOLERANCE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// When a rollup's reported totals disagree enough with raw data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyPolicy {
    pub value_tolerance: Decimal,
}

impl Default for DiscrepancyPolicy {
    fn default() -> Self {
        Self {
            value_tolerance: DEFAULT_VALUE_TOLERANCE,
        }
    }
}

impl DiscrepancyPolicy {
    pub fn new(value_tolerance: Decimal) -> Self {
        Self { value_tolerance }
    }

    /// Any count difference is material; values must differ by more than the tolerance.
    /// A difference too large to represent is material.
    pub fn is_material(&self, reported: &ReportTotals, recomputed: &ReportTotals) -> bool {
        reported.count != recomputed.count
            || reported
                .value
                .checked_sub(recomputed.value)
                .map_or(true, |diff| diff.abs() > self.value_tolerance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownSource {
    /// Taken from a stored daily report
    Report,
    /// Synthesized from raw data for a day without a report
    Reconstructed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBreakdownEntry {
    pub date: NaiveDate,
    pub totals: ReportTotals,
    pub source: BreakdownSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRollup {
    pub id: Uuid,
    pub period: DateRange,
    pub kind: ReportKind,
    pub owner_id: Uuid,
    /// Effective totals: the reported ones, or the recomputed ones on discrepancy
    pub totals: ReportTotals,
    /// Sum of the stored daily reports
    pub reported_totals: ReportTotals,
    /// Totals recomputed from raw movements or sales
    pub recomputed_totals: ReportTotals,
    pub has_discrepancy: bool,
    /// `recomputed.count - reported.count`
    pub count_difference: i64,
    /// `recomputed.value - reported.value`
    pub value_difference: Decimal,
    pub daily_breakdown: Vec<DailyBreakdownEntry>,
    /// Days with raw activity but no daily report; candidates for regeneration
    pub missing_days: Vec<NaiveDate>,
    pub generated_at: DateTime<Utc>,
}

impl MonthlyRollup {
    /// Combine the period's daily reports with per-day raw totals.
    ///
    /// Reports outside `period` or of another kind are ignored. Raw data wins
    /// when the policy calls the difference material.
    pub fn assemble(
        period: DateRange,
        kind: ReportKind,
        owner_id: Uuid,
        reports: &[DailyReport],
        raw_by_day: &BTreeMap<NaiveDate, ReportTotals>,
        policy: &DiscrepancyPolicy,
    ) -> Result<Self, ValuationError> {
        let reports: Vec<&DailyReport> = reports
            .iter()
            .filter(|report| report.kind == kind && period.contains(report.subject_date))
            .collect();

        let reported_totals = ReportTotals::checked_sum(reports.iter().map(|report| report.totals))
            .ok_or(ValuationError::Overflow("reported totals"))?;
        let recomputed_totals = ReportTotals::checked_sum(
            raw_by_day
                .iter()
                .filter(|(date, _)| period.contains(**date))
                .map(|(_, totals)| *totals),
        )
        .ok_or(ValuationError::Overflow("recomputed totals"))?;
        let count_difference = recomputed_totals
            .count
            .checked_sub(reported_totals.count)
            .ok_or(ValuationError::Overflow("count_difference"))?;
        let value_difference = recomputed_totals
            .value
            .checked_sub(reported_totals.value)
            .ok_or(ValuationError::Overflow("value_difference"))?;
        let has_discrepancy = policy.is_material(&reported_totals, &recomputed_totals);

        let reported_days: BTreeSet<NaiveDate> =
            reports.iter().map(|report| report.subject_date).collect();
        let missing_days: Vec<NaiveDate> = period
            .days()
            .filter(|day| !reported_days.contains(day))
            .filter(|day| raw_by_day.get(day).is_some_and(|totals| !totals.is_empty()))
            .collect();

        let mut daily_breakdown: Vec<DailyBreakdownEntry> = reports
            .iter()
            .map(|report| DailyBreakdownEntry {
                date: report.subject_date,
                totals: report.totals,
                source: BreakdownSource::Report,
            })
            .collect();
        if has_discrepancy {
            daily_breakdown.extend(missing_days.iter().map(|day| DailyBreakdownEntry {
                date: *day,
                totals: raw_by_day[day],
                source: BreakdownSource::Reconstructed,
            }));
        }
        daily_breakdown.sort_by_key(|entry| entry.date);

        Ok(Self {
            id: Uuid::new_v4(),
            period,
            kind,
            owner_id,
            totals: if has_discrepancy {
                recomputed_totals
            } else {
                reported_totals
            },
            reported_totals,
            recomputed_totals,
            has_discrepancy,
            count_difference,
            value_difference,
            daily_breakdown,
            missing_days,
            generated_at: Utc::now(),
        })
    }

    pub fn reconstructed_days(&self) -> usize {
        self.daily_breakdown
            .iter()
            .filter(|entry| entry.source == BreakdownSource::Reconstructed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportPayload, SalesBreakdown};
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn report(day: u32, totals: ReportTotals) -> DailyReport {
        DailyReport {
            id: Uuid::new_v4(),
            subject_date: date(day),
            owner_id: Uuid::nil(),
            kind: ReportKind::Sales,
            totals,
            payload: ReportPayload::Sales(SalesBreakdown {
                total_amount: totals.value,
                sale_count: totals.count,
                total_items: 0,
                by_payment_method: Vec::new(),
            }),
            inconsistencies: Vec::new(),
            is_balanced: true,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_policy_tolerance() {
        let policy = DiscrepancyPolicy::default();
        let base = ReportTotals::new(5, dec!(10000));
        assert!(!policy.is_material(&base, &ReportTotals::new(5, dec!(11000))));
        assert!(policy.is_material(&base, &ReportTotals::new(5, dec!(11000.01))));
        assert!(policy.is_material(&base, &ReportTotals::new(6, dec!(10000))));
        assert!(policy.is_material(
            &ReportTotals::new(5, Decimal::MAX),
            &ReportTotals::new(5, Decimal::MIN)
        ));
    }

    #[test]
    fn test_matching_rollup_keeps_reported_totals() {
        let period = DateRange::month(2024, 4).unwrap();
        let reports = vec![
            report(1, ReportTotals::new(2, dec!(300))),
            report(2, ReportTotals::new(1, dec!(100))),
        ];
        let raw = BTreeMap::from([
            (date(1), ReportTotals::new(2, dec!(300))),
            (date(2), ReportTotals::new(1, dec!(150))),
        ]);

        let rollup = MonthlyRollup::assemble(
            period,
            ReportKind::Sales,
            Uuid::nil(),
            &reports,
            &raw,
            &DiscrepancyPolicy::default(),
        )
        .unwrap();
        assert!(!rollup.has_discrepancy);
        assert_eq!(rollup.totals, ReportTotals::new(3, dec!(400)));
        assert_eq!(rollup.value_difference, dec!(50));
        assert_eq!(rollup.reconstructed_days(), 0);
    }

    #[test]
    fn test_discrepancy_substitutes_raw_and_reconstructs() {
        let period = DateRange::month(2024, 4).unwrap();
        let reports = vec![report(1, ReportTotals::new(1, dec!(100)))];
        let raw = BTreeMap::from([
            (date(1), ReportTotals::new(1, dec!(100))),
            (date(3), ReportTotals::new(2, dec!(5000))),
        ]);

        let rollup = MonthlyRollup::assemble(
            period,
            ReportKind::Sales,
            Uuid::nil(),
            &reports,
            &raw,
            &DiscrepancyPolicy::default(),
        )
        .unwrap();
        assert!(rollup.has_discrepancy);
        assert_eq!(rollup.totals, ReportTotals::new(3, dec!(5100)));
        assert_eq!(rollup.reported_totals, ReportTotals::new(1, dec!(100)));
        assert_eq!(rollup.missing_days, vec![date(3)]);
        assert_eq!(rollup.daily_breakdown.len(), 2);
        assert_eq!(rollup.daily_breakdown[1].source, BreakdownSource::Reconstructed);
    }

    #[test]
    fn test_reports_of_other_kind_ignored() {
        let period = DateRange::month(2024, 4).unwrap();
        let mut stock = report(1, ReportTotals::new(9, dec!(9)));
        stock.kind = ReportKind::Stock;
        let rollup = MonthlyRollup::assemble(
            period,
            ReportKind::Sales,
            Uuid::nil(),
            &[stock],
            &BTreeMap::new(),
            &DiscrepancyPolicy::default(),
        )
        .unwrap();
        assert_eq!(rollup.reported_totals, ReportTotals::default());
        assert!(!rollup.has_discrepancy);
    }

    #[test]
    fn test_oversized_totals_are_errors() {
        let period = DateRange::month(2024, 4).unwrap();
        let reports = vec![
            report(1, ReportTotals::new(1, Decimal::MAX)),
            report(2, ReportTotals::new(1, Decimal::MAX)),
        ];

        let err = MonthlyRollup::assemble(
            period,
            ReportKind::Sales,
            Uuid::nil(),
            &reports,
            &BTreeMap::new(),
            &DiscrepancyPolicy::default(),
        )
        .unwrap_err();
        assert_eq!(err, ValuationError::Overflow("reported totals"));

        let raw = BTreeMap::from([(date(1), ReportTotals::new(1, Decimal::MIN))]);
        let err = MonthlyRollup::assemble(
            period,
            ReportKind::Sales,
            Uuid::nil(),
            &reports[..1],
            &raw,
            &DiscrepancyPolicy::default(),
        )
        .unwrap_err();
        assert_eq!(err, ValuationError::Overflow("value_difference"));
    }
}
