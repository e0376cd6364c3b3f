//! Stock ledger service: records movements and keeps item quantities in step

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    price_movement, validate_item_pricing, validate_movement_quantity, validate_price_hint, Item,
    Movement, MovementKind, Reference,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

/// Stock ledger service
#[derive(Clone)]
pub struct StockLedger<S> {
    store: S,
}

/// Input for recording a movement
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordMovementInput {
    pub item_id: Uuid,
    pub kind: MovementKind,
    /// Requested quantity; the sign is normalized for `kind`
    pub quantity: i64,
    pub actor_id: Uuid,
    pub reference: Option<Reference>,
    /// Unit price to use instead of the item's defaults
    pub price_hint: Option<Decimal>,
    /// Let `out`/`damage` take stock below zero
    #[serde(default)]
    pub allow_negative: bool,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl RecordMovementInput {
    pub fn new(item_id: Uuid, kind: MovementKind, quantity: i64, actor_id: Uuid) -> Self {
        Self {
            item_id,
            kind,
            quantity,
            actor_id,
            reference: None,
            price_hint: None,
            allow_negative: false,
            notes: None,
        }
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_price_hint(mut self, price: Decimal) -> Self {
        self.price_hint = Some(price);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn allow_negative(mut self) -> Self {
        self.allow_negative = true;
        self
    }
}

/// Replay of an item's movements against its stored quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceCheck {
    pub item_id: Uuid,
    pub item_quantity: i64,
    /// Signed sum of all movement quantities
    pub ledger_quantity: i64,
    pub movement_count: usize,
    /// Movements whose `stock_before` differs from the previous `stock_after`
    pub chain_breaks: usize,
}

impl BalanceCheck {
    pub fn is_consistent(&self) -> bool {
        self.item_quantity == self.ledger_quantity && self.chain_breaks == 0
    }
}

/// Build the movement `input` produces against the item's current state.
///
/// Fails with `InsufficientStock` when an `out`/`damage` would take stock
/// below zero and the input does not allow it.
pub fn plan_movement(
    item: &Item,
    input: &RecordMovementInput,
    created_at: DateTime<Utc>,
) -> AppResult<Movement> {
    validate_item_pricing(item.cost, item.price)
        .map_err(|msg| AppError::NegativePrice(msg.to_string()))?;

    let delta = input.kind.effective_delta(input.quantity);
    let stock_before = item.quantity;
    let stock_after = stock_before
        .checked_add(delta)
        .ok_or_else(|| AppError::InvalidQuantity("Stock level out of range".to_string()))?;

    if input.kind.requires_available_stock() && stock_after < 0 && !input.allow_negative {
        return Err(AppError::InsufficientStock {
            item_id: item.id,
            requested: delta.abs(),
            available: stock_before,
        });
    }

    let pricing = price_movement(
        input.kind,
        delta,
        input.reference.as_ref(),
        input.price_hint,
        item.cost,
        item.price,
    )?;
    let notes = match &input.notes {
        Some(extra) => format!("{} | {}", pricing.note, extra),
        None => pricing.note,
    };

    Ok(Movement {
        id: Uuid::new_v4(),
        item_id: item.id,
        actor_id: input.actor_id,
        kind: input.kind,
        quantity: delta,
        stock_before,
        stock_after,
        unit_cost: pricing.unit_cost,
        unit_price: pricing.unit_price,
        value_in: pricing.value_in,
        value_out: pricing.value_out,
        value_change: pricing.value_change,
        category: pricing.category,
        reference: input.reference,
        notes: Some(notes),
        created_at,
    })
}

impl<S: LedgerStore> StockLedger<S> {
    /// Create a new StockLedger instance
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a movement now
    pub async fn record(&self, input: RecordMovementInput) -> AppResult<Movement> {
        self.record_at(input, Utc::now()).await
    }

    /// Record a movement with an explicit timestamp
    pub async fn record_at(
        &self,
        input: RecordMovementInput,
        created_at: DateTime<Utc>,
    ) -> AppResult<Movement> {
        input.validate()?;
        if let Err(msg) = validate_movement_quantity(input.quantity) {
            tracing::error!(item_id = %input.item_id, kind = %input.kind, "Rejected movement: {}", msg);
            return Err(AppError::InvalidQuantity(msg.to_string()));
        }
        if let Err(msg) = validate_price_hint(input.price_hint) {
            tracing::error!(item_id = %input.item_id, kind = %input.kind, "Rejected movement: {}", msg);
            return Err(AppError::NegativePrice(msg.to_string()));
        }

        let item_id = input.item_id;
        let kind = input.kind;
        let result = self
            .store
            .apply_movement(item_id, move |item| plan_movement(item, &input, created_at))
            .await;

        match &result {
            Ok(movement) => tracing::info!(
                item_id = %item_id,
                kind = %kind,
                quantity = movement.quantity,
                stock_after = movement.stock_after,
                value_change = %movement.value_change,
                category = %movement.category,
                "Recorded stock movement"
            ),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(item_id = %item_id, kind = %kind, "Movement rejected: {}", err)
            }
            Err(err) => tracing::error!(item_id = %item_id, kind = %kind, "Movement failed: {}", err),
        }

        result
    }

    /// All movements of an item in the order they were recorded
    pub async fn item_history(&self, item_id: Uuid) -> AppResult<Vec<Movement>> {
        self.store.get_item(item_id).await?;
        self.store.movements_for_item(item_id).await
    }

    /// Replay an item's movements and compare with its stored quantity
    pub async fn verify_balance(&self, item_id: Uuid) -> AppResult<BalanceCheck> {
        let item = self.store.get_item(item_id).await?;
        let movements = self.store.movements_for_item(item_id).await?;

        let ledger_quantity = movements
            .iter()
            .try_fold(0i64, |acc, m| acc.checked_add(m.quantity))
            .ok_or_else(|| AppError::InvalidQuantity("Ledger quantity out of range".to_string()))?;
        let chain_breaks = movements
            .windows(2)
            .filter(|pair| pair[1].stock_before != pair[0].stock_after)
            .count();

        let check = BalanceCheck {
            item_id,
            item_quantity: item.quantity,
            ledger_quantity,
            movement_count: movements.len(),
            chain_breaks,
        };

        if !check.is_consistent() {
            tracing::warn!(
                item_id = %item_id,
                item_quantity = check.item_quantity,
                ledger_quantity = check.ledger_quantity,
                chain_breaks = check.chain_breaks,
                "Item quantity does not match its ledger"
            );
        }

        Ok(check)
    }
}
