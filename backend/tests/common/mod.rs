//! Fixtures shared by the integration tests
#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use shared::{Item, PaymentMethod, Sale, SaleLine, SaleStatus};
use stockroom::store::MemoryStore;
use uuid::Uuid;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(day: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(hour, minute, 0).unwrap())
}

/// Store holding a single item with zero stock
pub async fn store_with_item(cost: Decimal, price: Decimal) -> (MemoryStore, Item) {
    let store = MemoryStore::new();
    let item = Item::new("SKU-0001", "Jasmine rice 5kg", cost, price);
    store.insert_item(item.clone()).await;
    (store, item)
}

pub async fn add_item(store: &MemoryStore, sku: &str, cost: Decimal, price: Decimal) -> Item {
    let item = Item::new(sku, sku, cost, price);
    store.insert_item(item.clone()).await;
    item
}

/// A completed sale with one line per `(item, quantity, unit_price)`
pub fn completed_sale(
    number: &str,
    cashier_id: Uuid,
    completed_at: DateTime<Utc>,
    lines: &[(Uuid, i64, Decimal)],
) -> Sale {
    let sale_id = Uuid::new_v4();
    let lines: Vec<SaleLine> = lines
        .iter()
        .map(|(item_id, quantity, unit_price)| SaleLine {
            id: Uuid::new_v4(),
            sale_id,
            item_id: *item_id,
            quantity: *quantity,
            unit_price: *unit_price,
        })
        .collect();

    Sale {
        id: sale_id,
        number: number.to_string(),
        cashier_id,
        status: SaleStatus::Completed,
        payment_method: PaymentMethod::Cash,
        total_amount: lines.iter().map(|line| line.subtotal().unwrap()).sum(),
        completed_at,
        lines,
    }
}
