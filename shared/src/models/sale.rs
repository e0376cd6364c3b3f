//! Sales records as exposed by the point-of-sale collaborator

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Completed,
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for SaleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SaleStatus::Pending),
            "completed" => Ok(SaleStatus::Completed),
            "cancelled" => Ok(SaleStatus::Cancelled),
            _ => Err(format!("unknown sale status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    QrCode,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::QrCode => "qr_code",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "qr_code" => Ok(PaymentMethod::QrCode),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(format!("unknown payment method: {}", s)),
        }
    }
}

/// A sale header with its lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: Uuid,
    /// Human-facing receipt number
    pub number: String,
    pub cashier_id: Uuid,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub completed_at: DateTime<Utc>,
    pub lines: Vec<SaleLine>,
}

impl Sale {
    pub fn is_completed(&self) -> bool {
        self.status == SaleStatus::Completed
    }

    /// Units sold across all lines; `None` if the sum overflows
    pub fn item_count(&self) -> Option<i64> {
        self.lines
            .iter()
            .try_fold(0i64, |acc, line| acc.checked_add(line.quantity))
    }
}

/// A sale line. Its `id` is what outbound movements carry as their reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleLine {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i64,
    pub unit_price: Decimal,
}

impl SaleLine {
    /// `quantity x unit_price`; `None` if it does not fit in a `Decimal`
    pub fn subtotal(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.unit_price)
    }
}
