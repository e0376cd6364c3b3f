//! Valuation service for point-in-time stock value snapshots

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{ValuationMethod, ValuationSnapshot};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, ReportStore};

/// Valuation service
#[derive(Clone)]
pub struct ValuationService<S> {
    store: S,
    method: ValuationMethod,
}

impl<S: ReportStore> ValuationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            method: ValuationMethod::default(),
        }
    }

    /// Record snapshots under a different valuation method label
    pub fn with_method(mut self, method: ValuationMethod) -> Self {
        self.method = method;
        self
    }

    /// Value `quantity_on_hand` units at the given cost and price and store the
    /// snapshot for `(item_id, as_of)`, replacing any earlier one.
    pub async fn compute(
        &self,
        item_id: Uuid,
        as_of: NaiveDate,
        quantity_on_hand: i64,
        unit_cost: Decimal,
        unit_price: Decimal,
    ) -> AppResult<ValuationSnapshot> {
        let snapshot = ValuationSnapshot::compute(
            item_id,
            as_of,
            quantity_on_hand,
            unit_cost,
            unit_price,
            self.method,
        )
        .map_err(|err| {
            tracing::error!(item_id = %item_id, as_of = %as_of, "Invalid valuation input: {}", err);
            AppError::from(err)
        })?;

        let stored = self.store.upsert_valuation(&snapshot).await?;

        tracing::debug!(
            item_id = %item_id,
            as_of = %as_of,
            cost_value = %stored.cost_value,
            market_value = %stored.market_value,
            "Stored valuation snapshot"
        );

        Ok(stored)
    }
}

impl<S: ReportStore + LedgerStore> ValuationService<S> {
    /// Snapshot an item using its current quantity, cost and price
    pub async fn snapshot_item(&self, item_id: Uuid, as_of: NaiveDate) -> AppResult<ValuationSnapshot> {
        let item = self.store.get_item(item_id).await?;
        self.compute(item.id, as_of, item.quantity, item.cost, item.price)
            .await
    }
}
