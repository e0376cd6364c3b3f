//! Point-in-time stock valuation

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Valuation method recorded on a snapshot.
///
/// Stored for reporting only; every method values stock at the supplied unit
/// cost and price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValuationMethod {
    Fifo,
    Lifo,
    #[default]
    Average,
}

impl ValuationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValuationMethod::Fifo => "fifo",
            ValuationMethod::Lifo => "lifo",
            ValuationMethod::Average => "average",
        }
    }
}

impl FromStr for ValuationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fifo" => Ok(ValuationMethod::Fifo),
            "lifo" => Ok(ValuationMethod::Lifo),
            "average" => Ok(ValuationMethod::Average),
            _ => Err(format!("unknown valuation method: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValuationError {
    #[error("quantity on hand cannot be negative (got {0})")]
    NegativeQuantity(i64),

    #[error("{field} cannot be negative (got {value})")]
    NegativePrice { field: &'static str, value: Decimal },

    #[error("{0} is too large to represent")]
    Overflow(&'static str),
}

/// Cost and market value of an item's on-hand stock as of a date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValuationSnapshot {
    pub item_id: Uuid,
    pub as_of_date: NaiveDate,
    pub quantity_on_hand: i64,
    pub unit_cost: Decimal,
    pub unit_price: Decimal,
    pub cost_value: Decimal,
    pub market_value: Decimal,
    pub profit: Decimal,
    /// Profit over cost value, percent, two decimal places
    pub margin_pct: Decimal,
    pub valuation_method: ValuationMethod,
}

impl ValuationSnapshot {
    pub fn compute(
        item_id: Uuid,
        as_of_date: NaiveDate,
        quantity_on_hand: i64,
        unit_cost: Decimal,
        unit_price: Decimal,
        valuation_method: ValuationMethod,
    ) -> Result<Self, ValuationError> {
        if quantity_on_hand < 0 {
            return Err(ValuationError::NegativeQuantity(quantity_on_hand));
        }
        if unit_cost < Decimal::ZERO {
            return Err(ValuationError::NegativePrice {
                field: "unit_cost",
                value: unit_cost,
            });
        }
        if unit_price < Decimal::ZERO {
            return Err(ValuationError::NegativePrice {
                field: "unit_price",
                value: unit_price,
            });
        }

        let quantity = Decimal::from(quantity_on_hand);
        let cost_value = quantity
            .checked_mul(unit_cost)
            .ok_or(ValuationError::Overflow("cost_value"))?;
        let market_value = quantity
            .checked_mul(unit_price)
            .ok_or(ValuationError::Overflow("market_value"))?;
        let profit = market_value - cost_value;
        let margin_pct = calculate_margin_pct(profit, cost_value)
            .ok_or(ValuationError::Overflow("margin_pct"))?;

        Ok(Self {
            item_id,
            as_of_date,
            quantity_on_hand,
            unit_cost,
            unit_price,
            cost_value,
            market_value,
            profit,
            margin_pct,
            valuation_method,
        })
    }
}

/// Margin percentage; zero when there is no cost basis.
///
/// `None` when the ratio does not fit in a `Decimal`.
pub fn calculate_margin_pct(profit: Decimal, cost_value: Decimal) -> Option<Decimal> {
    if cost_value.is_zero() {
        return Some(Decimal::ZERO);
    }
    profit
        .checked_div(cost_value)?
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|pct| pct.round_dp(2))
}
