//! Stock item model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stocked item. `quantity` changes only through the stock ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    /// Units on hand
    pub quantity: i64,
    /// Reference purchase cost per unit
    pub cost: Decimal,
    /// Reference selling price per unit
    pub price: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, cost: Decimal, price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            sku: sku.into(),
            name: name.into(),
            quantity: 0,
            cost,
            price,
            updated_at: Utc::now(),
        }
    }
}
