//! Daily sales and stock reports, and the sale-line cross-check

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Movement, MovementCategory, MovementKind, PaymentMethod, Sale, ValuationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Sales,
    Stock,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Sales => "sales",
            ReportKind::Stock => "stock",
        }
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sales" => Ok(ReportKind::Sales),
            "stock" => Ok(ReportKind::Stock),
            _ => Err(format!("unknown report kind: {}", s)),
        }
    }
}

/// Headline figures of a report.
///
/// Sales: `count` completed sales worth `value`.
/// Stock: `count` movements with a turnover of `value` (sum of `|value_change|`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub count: i64,
    pub value: Decimal,
}

impl ReportTotals {
    pub fn new(count: i64, value: Decimal) -> Self {
        Self { count, value }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.value.is_zero()
    }
}

impl ReportTotals {
    pub fn checked_add(self, rhs: ReportTotals) -> Option<ReportTotals> {
        Some(ReportTotals {
            count: self.count.checked_add(rhs.count)?,
            value: self.value.checked_add(rhs.value)?,
        })
    }

    /// Sum of all `totals`, or `None` on overflow
    pub fn checked_sum<I>(totals: I) -> Option<ReportTotals>
    where
        I: IntoIterator<Item = ReportTotals>,
    {
        totals
            .into_iter()
            .try_fold(ReportTotals::default(), ReportTotals::checked_add)
    }

    /// Count one more record worth `value`
    fn record(&mut self, value: Decimal) -> Result<(), ValuationError> {
        *self = self
            .checked_add(ReportTotals::new(1, value))
            .ok_or(ValuationError::Overflow("report totals"))?;
        Ok(())
    }
}

fn checked_amount<I>(values: I, what: &'static str) -> Result<Decimal, ValuationError>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or(ValuationError::Overflow(what))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodBreakdown {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesBreakdown {
    pub total_amount: Decimal,
    pub sale_count: i64,
    pub total_items: i64,
    pub by_payment_method: Vec<PaymentMethodBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindBreakdown {
    pub kind: MovementKind,
    pub count: i64,
    /// Signed sum of stock changes
    pub quantity: i64,
    /// Sum of `|value_change|`
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: MovementCategory,
    pub count: i64,
    pub value_change: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockBreakdown {
    pub movement_count: i64,
    pub total_stock_value: Decimal,
    pub value_in: Decimal,
    pub value_out: Decimal,
    pub net_value_change: Decimal,
    pub by_kind: Vec<KindBreakdown>,
    pub by_category: Vec<CategoryBreakdown>,
    pub sales_checked: i64,
    pub sale_lines_checked: i64,
}

/// Structured detail stored alongside the totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportPayload {
    Sales(SalesBreakdown),
    Stock(StockBreakdown),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// A completed sale line with no outbound movement
    MissingMovement,
    /// A completed sale line with more than one outbound movement
    DuplicateMovement,
}

/// A sale line whose stock record does not match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inconsistency {
    pub kind: InconsistencyKind,
    pub sale_id: Uuid,
    pub sale_number: String,
    pub sale_line_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i64,
    pub explanation: String,
}

/// A generated daily report. One per `(subject_date, kind, owner_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub id: Uuid,
    pub subject_date: NaiveDate,
    pub owner_id: Uuid,
    pub kind: ReportKind,
    pub totals: ReportTotals,
    pub payload: ReportPayload,
    pub inconsistencies: Vec<Inconsistency>,
    pub is_balanced: bool,
    pub generated_at: DateTime<Utc>,
}

impl DailyReport {
    /// Sales report over the owner's completed sales for the day
    pub fn sales(subject_date: NaiveDate, owner_id: Uuid, sales: &[Sale]) -> Result<Self, ValuationError> {
        let breakdown = summarize_sales(sales)?;
        Ok(Self {
            id: Uuid::new_v4(),
            subject_date,
            owner_id,
            kind: ReportKind::Sales,
            totals: ReportTotals::new(breakdown.sale_count, breakdown.total_amount),
            payload: ReportPayload::Sales(breakdown),
            inconsistencies: Vec::new(),
            is_balanced: true,
            generated_at: Utc::now(),
        })
    }

    /// Store-wide stock report, cross-checked against the day's completed sales
    pub fn stock(
        subject_date: NaiveDate,
        owner_id: Uuid,
        movements: &[Movement],
        sales: &[Sale],
    ) -> Result<Self, ValuationError> {
        let mut breakdown = summarize_movements(movements)?;
        let completed: Vec<&Sale> = sales.iter().filter(|sale| sale.is_completed()).collect();
        breakdown.sales_checked = completed.len() as i64;
        breakdown.sale_lines_checked = completed.iter().map(|sale| sale.lines.len() as i64).sum();

        let inconsistencies = find_unmatched_sale_lines(sales, movements);
        Ok(Self {
            id: Uuid::new_v4(),
            subject_date,
            owner_id,
            kind: ReportKind::Stock,
            totals: ReportTotals::new(breakdown.movement_count, breakdown.total_stock_value),
            payload: ReportPayload::Stock(breakdown),
            is_balanced: inconsistencies.is_empty(),
            inconsistencies,
            generated_at: Utc::now(),
        })
    }
}

/// Aggregate completed sales. Non-completed sales are ignored.
pub fn summarize_sales(sales: &[Sale]) -> Result<SalesBreakdown, ValuationError> {
    let mut by_method: BTreeMap<PaymentMethod, ReportTotals> = BTreeMap::new();
    let mut totals = ReportTotals::default();
    let mut total_items: i64 = 0;

    for sale in sales.iter().filter(|sale| sale.is_completed()) {
        totals.record(sale.total_amount)?;
        total_items = sale
            .item_count()
            .and_then(|items| total_items.checked_add(items))
            .ok_or(ValuationError::Overflow("total_items"))?;
        by_method
            .entry(sale.payment_method)
            .or_default()
            .record(sale.total_amount)?;
    }

    Ok(SalesBreakdown {
        total_amount: totals.value,
        sale_count: totals.count,
        total_items,
        by_payment_method: by_method
            .into_iter()
            .map(|(method, totals)| PaymentMethodBreakdown {
                method,
                amount: totals.value,
                count: totals.count,
            })
            .collect(),
    })
}

/// Aggregate a set of movements. Cross-check fields are left at zero.
pub fn summarize_movements(movements: &[Movement]) -> Result<StockBreakdown, ValuationError> {
    let value_in = checked_amount(movements.iter().map(|m| m.value_in), "value_in")?;
    let value_out = checked_amount(movements.iter().map(|m| m.value_out), "value_out")?;
    let total_stock_value =
        checked_amount(movements.iter().map(|m| m.value_change.abs()), "total_stock_value")?;

    let mut by_kind = Vec::new();
    for kind in MovementKind::ALL {
        let of_kind: Vec<&Movement> = movements.iter().filter(|m| m.kind == kind).collect();
        if of_kind.is_empty() {
            continue;
        }
        let quantity = of_kind
            .iter()
            .try_fold(0i64, |acc, m| acc.checked_add(m.quantity))
            .ok_or(ValuationError::Overflow("quantity"))?;
        by_kind.push(KindBreakdown {
            kind,
            count: of_kind.len() as i64,
            quantity,
            value: checked_amount(of_kind.iter().map(|m| m.value_change.abs()), "value")?,
        });
    }

    let by_category = [
        MovementCategory::StockIn,
        MovementCategory::Sale,
        MovementCategory::StockOut,
        MovementCategory::Adjustment,
        MovementCategory::Other,
    ]
    .into_iter()
    .filter_map(|category| {
        let of_category: Vec<&Movement> =
            movements.iter().filter(|m| m.category == category).collect();
        (!of_category.is_empty()).then(|| {
            Ok::<_, ValuationError>(CategoryBreakdown {
                category,
                count: of_category.len() as i64,
                value_change: checked_amount(
                    of_category.iter().map(|m| m.value_change),
                    "value_change",
                )?,
            })
        })
    })
    .collect::<Result<Vec<_>, _>>()?;

    Ok(StockBreakdown {
        movement_count: movements.len() as i64,
        total_stock_value,
        value_in,
        value_out,
        net_value_change: value_in
            .checked_sub(value_out)
            .ok_or(ValuationError::Overflow("net_value_change"))?,
        by_kind,
        by_category,
        sales_checked: 0,
        sale_lines_checked: 0,
    })
}

/// Every completed sale line must have exactly one `out` movement for the same
/// item referencing it. Lines breaking that rule are reported in sale order.
pub fn find_unmatched_sale_lines(sales: &[Sale], movements: &[Movement]) -> Vec<Inconsistency> {
    let mut matches: HashMap<(Uuid, Uuid), usize> = HashMap::new();
    for movement in movements.iter().filter(|m| m.kind == MovementKind::Out) {
        if let Some(line_id) = movement.sale_line_id() {
            *matches.entry((movement.item_id, line_id)).or_default() += 1;
        }
    }

    let mut completed: Vec<&Sale> = sales.iter().filter(|sale| sale.is_completed()).collect();
    completed.sort_by(|a, b| {
        a.completed_at
            .cmp(&b.completed_at)
            .then_with(|| a.number.cmp(&b.number))
    });

    let mut inconsistencies = Vec::new();
    for sale in completed {
        for line in &sale.lines {
            let found = matches.get(&(line.item_id, line.id)).copied().unwrap_or(0);
            let (kind, explanation) = match found {
                1 => continue,
                0 => (
                    InconsistencyKind::MissingMovement,
                    format!(
                        "Sale {}: item {} x{} has no matching outbound stock movement",
                        sale.number, line.item_id, line.quantity
                    ),
                ),
                n => (
                    InconsistencyKind::DuplicateMovement,
                    format!(
                        "Sale {}: item {} x{} has {} outbound stock movements, expected 1",
                        sale.number, line.item_id, line.quantity, n
                    ),
                ),
            };
            inconsistencies.push(Inconsistency {
                kind,
                sale_id: sale.id,
                sale_number: sale.number.clone(),
                sale_line_id: line.id,
                item_id: line.item_id,
                quantity: line.quantity,
                explanation,
            });
        }
    }

    inconsistencies
}

/// Per-day stock totals straight from movements, keyed by UTC date
pub fn daily_stock_totals(
    movements: &[Movement],
) -> Result<BTreeMap<NaiveDate, ReportTotals>, ValuationError> {
    let mut days: BTreeMap<NaiveDate, ReportTotals> = BTreeMap::new();
    for movement in movements {
        days.entry(movement.created_at.date_naive())
            .or_default()
            .record(movement.value_change.abs())?;
    }
    Ok(days)
}

/// Per-day sales totals straight from completed sales, keyed by UTC date
pub fn daily_sales_totals(sales: &[Sale]) -> Result<BTreeMap<NaiveDate, ReportTotals>, ValuationError> {
    let mut days: BTreeMap<NaiveDate, ReportTotals> = BTreeMap::new();
    for sale in sales.iter().filter(|sale| sale.is_completed()) {
        days.entry(sale.completed_at.date_naive())
            .or_default()
            .record(sale.total_amount)?;
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{price_movement, Reference, SaleLine, SaleStatus};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    fn movement(kind: MovementKind, qty: i64, reference: Option<Reference>, item_id: Uuid) -> Movement {
        let delta = kind.effective_delta(qty);
        let pricing = price_movement(kind, delta, reference.as_ref(), None, dec!(10), dec!(15)).unwrap();
        Movement {
            id: Uuid::new_v4(),
            item_id,
            actor_id: Uuid::nil(),
            kind,
            quantity: delta,
            stock_before: 100,
            stock_after: 100 + delta,
            unit_cost: pricing.unit_cost,
            unit_price: pricing.unit_price,
            value_in: pricing.value_in,
            value_out: pricing.value_out,
            value_change: pricing.value_change,
            category: pricing.category,
            reference,
            notes: None,
            created_at: at(1, 10),
        }
    }

    fn sale(number: &str, method: PaymentMethod, lines: Vec<(Uuid, i64)>) -> Sale {
        let id = Uuid::new_v4();
        let lines: Vec<SaleLine> = lines
            .into_iter()
            .map(|(item_id, quantity)| SaleLine {
                id: Uuid::new_v4(),
                sale_id: id,
                item_id,
                quantity,
                unit_price: dec!(15),
            })
            .collect();
        Sale {
            id,
            number: number.to_string(),
            cashier_id: Uuid::nil(),
            status: SaleStatus::Completed,
            payment_method: method,
            total_amount: lines.iter().map(|line| line.subtotal().unwrap()).sum(),
            completed_at: at(1, 11),
            lines,
        }
    }

    #[test]
    fn test_summarize_sales_groups_by_payment_method() {
        let item = Uuid::new_v4();
        let mut cancelled = sale("S-3", PaymentMethod::Cash, vec![(item, 9)]);
        cancelled.status = SaleStatus::Cancelled;
        let sales = vec![
            sale("S-1", PaymentMethod::Card, vec![(item, 2)]),
            sale("S-2", PaymentMethod::Cash, vec![(item, 1), (item, 3)]),
            cancelled,
        ];

        let breakdown = summarize_sales(&sales).unwrap();
        assert_eq!(breakdown.sale_count, 2);
        assert_eq!(breakdown.total_items, 6);
        assert_eq!(breakdown.total_amount, dec!(90));
        assert_eq!(breakdown.by_payment_method.len(), 2);
        assert_eq!(breakdown.by_payment_method[0].method, PaymentMethod::Cash);
        assert_eq!(breakdown.by_payment_method[0].amount, dec!(60));
    }

    #[test]
    fn test_total_stock_value_is_turnover_magnitude() {
        let item = Uuid::new_v4();
        let movements = vec![
            movement(MovementKind::In, 10, None, item),
            movement(MovementKind::Out, 4, None, item),
        ];
        let breakdown = summarize_movements(&movements).unwrap();
        assert_eq!(breakdown.movement_count, 2);
        assert_eq!(breakdown.total_stock_value, dec!(140));
        assert_eq!(breakdown.net_value_change, dec!(60));
        assert_eq!(breakdown.by_kind.len(), 2);
    }

    #[test]
    fn test_missing_movement_flagged() {
        let item_a = Uuid::new_v4();
        let item_b = Uuid::new_v4();
        let s = sale("S-100", PaymentMethod::Cash, vec![(item_a, 2), (item_b, 1)]);
        let movements = vec![movement(
            MovementKind::Out,
            2,
            Some(Reference::SaleLine(s.lines[0].id)),
            item_a,
        )];

        let found = find_unmatched_sale_lines(&[s.clone()], &movements);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, InconsistencyKind::MissingMovement);
        assert_eq!(found[0].sale_line_id, s.lines[1].id);
        assert!(found[0].explanation.contains("S-100"));
        assert!(found[0].explanation.contains("x1"));
    }

    #[test]
    fn test_wrong_item_or_kind_does_not_match() {
        let item = Uuid::new_v4();
        let s = sale("S-1", PaymentMethod::Cash, vec![(item, 1)]);
        let line = Reference::SaleLine(s.lines[0].id);
        let movements = vec![
            movement(MovementKind::Out, 1, Some(line), Uuid::new_v4()),
            movement(MovementKind::Damage, 1, Some(line), item),
        ];
        assert_eq!(find_unmatched_sale_lines(&[s], &movements).len(), 1);
    }

    #[test]
    fn test_duplicate_movement_flagged() {
        let item = Uuid::new_v4();
        let s = sale("S-1", PaymentMethod::Cash, vec![(item, 1)]);
        let line = Some(Reference::SaleLine(s.lines[0].id));
        let movements = vec![
            movement(MovementKind::Out, 1, line, item),
            movement(MovementKind::Out, 1, line, item),
        ];
        let found = find_unmatched_sale_lines(&[s], &movements);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, InconsistencyKind::DuplicateMovement);
    }

    #[test]
    fn test_stock_report_balanced_when_all_lines_matched() {
        let item = Uuid::new_v4();
        let s = sale("S-1", PaymentMethod::Card, vec![(item, 3)]);
        let movements = vec![movement(MovementKind::Out, 3, Some(Reference::SaleLine(s.lines[0].id)), item)];

        let report = DailyReport::stock(at(1, 0).date_naive(), Uuid::nil(), &movements, &[s]).unwrap();
        assert!(report.is_balanced);
        assert_eq!(report.totals, ReportTotals::new(1, dec!(45)));
        match report.payload {
            ReportPayload::Stock(breakdown) => {
                assert_eq!(breakdown.sales_checked, 1);
                assert_eq!(breakdown.sale_lines_checked, 1);
            }
            ReportPayload::Sales(_) => panic!("expected stock payload"),
        }
    }

    #[test]
    fn test_daily_stock_totals_by_date() {
        let item = Uuid::new_v4();
        let mut late = movement(MovementKind::In, 1, None, item);
        late.created_at = at(2, 23);
        let movements = vec![movement(MovementKind::In, 2, None, item), late];

        let days = daily_stock_totals(&movements).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[&at(1, 0).date_naive()], ReportTotals::new(1, dec!(20)));
        assert_eq!(days[&at(2, 0).date_naive()], ReportTotals::new(1, dec!(10)));
    }

    #[test]
    fn test_oversized_sums_are_errors() {
        let item = Uuid::new_v4();
        let mut big = sale("S-1", PaymentMethod::Cash, vec![(item, 1)]);
        big.total_amount = Decimal::MAX;
        let sales = vec![big.clone(), big];
        assert_eq!(summarize_sales(&sales).unwrap_err(), ValuationError::Overflow("report totals"));
        assert!(daily_sales_totals(&sales).is_err());
        assert!(DailyReport::sales(at(1, 0).date_naive(), Uuid::nil(), &sales).is_err());

        let mut huge = movement(MovementKind::In, 1, None, item);
        huge.value_in = Decimal::MAX;
        huge.value_change = Decimal::MAX;
        let movements = vec![huge.clone(), huge];
        assert_eq!(summarize_movements(&movements).unwrap_err(), ValuationError::Overflow("value_in"));
        assert!(daily_stock_totals(&movements).is_err());
    }

    #[test]
    fn test_item_count_overflow() {
        let item = Uuid::new_v4();
        let s = sale("S-1", PaymentMethod::Cash, vec![(item, i64::MAX), (item, 1)]);
        assert_eq!(s.item_count(), None);
    }
}
