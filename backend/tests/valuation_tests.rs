//! Valuation snapshot tests
//!
//! Tests for point-in-time valuation including:
//! - Cost, market value, profit and margin
//! - One snapshot per item and date
//! - Rejection of negative inputs

mod common;

use common::{date, store_with_item};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::{MovementKind, ValuationMethod, ValuationSnapshot};
use stockroom::services::{RecordMovementInput, StockLedger, ValuationService};
use stockroom::AppError;
use uuid::Uuid;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_compute_and_store() {
        let (store, item) = store_with_item(dec!(1000), dec!(1500)).await;
        let service = ValuationService::new(store.clone());
        let as_of = date(2024, 5, 31);

        let snapshot = service
            .compute(item.id, as_of, 40, dec!(1000), dec!(1500))
            .await
            .unwrap();

        assert_eq!(snapshot.cost_value, dec!(40000));
        assert_eq!(snapshot.market_value, dec!(60000));
        assert_eq!(snapshot.profit, dec!(20000));
        assert_eq!(snapshot.margin_pct, dec!(50));
        assert_eq!(snapshot.valuation_method, ValuationMethod::Average);
        assert_eq!(store.valuation(item.id, as_of).await, Some(snapshot));
    }

    /// A second snapshot for the same item and date replaces the first
    #[tokio::test]
    async fn test_recompute_overwrites_same_day() {
        let (store, item) = store_with_item(dec!(1000), dec!(1500)).await;
        let service = ValuationService::new(store.clone()).with_method(ValuationMethod::Fifo);
        let as_of = date(2024, 5, 31);

        service.compute(item.id, as_of, 40, dec!(1000), dec!(1500)).await.unwrap();
        service.compute(item.id, as_of, 10, dec!(1000), dec!(1200)).await.unwrap();

        let stored = store.valuation(item.id, as_of).await.unwrap();
        assert_eq!(stored.quantity_on_hand, 10);
        assert_eq!(stored.market_value, dec!(12000));
        assert_eq!(stored.margin_pct, dec!(20));
        assert_eq!(stored.valuation_method, ValuationMethod::Fifo);

        let next_day = date(2024, 6, 1);
        service.compute(item.id, next_day, 5, dec!(1000), dec!(1200)).await.unwrap();
        assert_eq!(store.valuation(item.id, as_of).await.unwrap().quantity_on_hand, 10);
    }

    #[tokio::test]
    async fn test_zero_cost_has_zero_margin() {
        let (store, item) = store_with_item(dec!(0), dec!(10)).await;
        let service = ValuationService::new(store);

        let snapshot = service
            .compute(item.id, date(2024, 5, 1), 3, dec!(0), dec!(10))
            .await
            .unwrap();

        assert_eq!(snapshot.profit, dec!(30));
        assert_eq!(snapshot.margin_pct, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_margin_rounded_to_two_places() {
        let (store, item) = store_with_item(dec!(3), dec!(4)).await;
        let service = ValuationService::new(store);

        let snapshot = service
            .compute(item.id, date(2024, 5, 1), 1, dec!(3), dec!(4))
            .await
            .unwrap();

        assert_eq!(snapshot.margin_pct, dec!(33.33));
    }

    #[tokio::test]
    async fn test_negative_inputs_rejected() {
        let (store, item) = store_with_item(dec!(1), dec!(1)).await;
        let service = ValuationService::new(store.clone());
        let as_of = date(2024, 5, 1);

        let err = service.compute(item.id, as_of, -1, dec!(1), dec!(1)).await.unwrap_err();
        assert!(matches!(err, AppError::NegativeQuantity(_)));
        assert!(err.is_contract_violation());

        let err = service.compute(item.id, as_of, 1, dec!(-1), dec!(1)).await.unwrap_err();
        assert!(matches!(err, AppError::NegativePrice(_)));

        let err = service.compute(item.id, as_of, 1, dec!(1), dec!(-0.01)).await.unwrap_err();
        assert!(matches!(err, AppError::NegativePrice(_)));

        assert_eq!(store.valuation(item.id, as_of).await, None);
    }

    /// Values too large for a decimal are rejected and nothing is stored
    #[tokio::test]
    async fn test_oversized_values_rejected() {
        let (store, item) = store_with_item(dec!(100000000000), dec!(1)).await;
        let service = ValuationService::new(store.clone());
        let as_of = date(2024, 5, 1);

        let err = service
            .compute(item.id, as_of, i64::MAX, dec!(100000000000), dec!(1))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidQuantity(_)));
        assert!(err.is_contract_violation());
        assert_eq!(store.valuation(item.id, as_of).await, None);
    }

    #[tokio::test]
    async fn test_snapshot_item_uses_current_stock() {
        let (store, item) = store_with_item(dec!(250), dec!(400)).await;
        let ledger = StockLedger::new(store.clone());
        let service = ValuationService::new(store.clone());
        let actor = Uuid::new_v4();

        ledger
            .record(RecordMovementInput::new(item.id, MovementKind::In, 12, actor))
            .await
            .unwrap();
        ledger
            .record(RecordMovementInput::new(item.id, MovementKind::Out, 2, actor))
            .await
            .unwrap();

        let snapshot = service.snapshot_item(item.id, date(2024, 5, 2)).await.unwrap();
        assert_eq!(snapshot.quantity_on_hand, 10);
        assert_eq!(snapshot.cost_value, dec!(2500));
        assert_eq!(snapshot.market_value, dec!(4000));
        assert_eq!(snapshot.margin_pct, dec!(60));
    }

    #[tokio::test]
    async fn test_snapshot_unknown_item() {
        let (store, _) = store_with_item(dec!(1), dec!(1)).await;
        let service = ValuationService::new(store);

        let err = service
            .snapshot_item(Uuid::new_v4(), date(2024, 5, 2))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        /// profit == market_value - cost_value for all valid inputs
        #[test]
        fn prop_profit_is_market_minus_cost(
            quantity in 0i64..100_000i64,
            cost_cents in 0i64..10_000_000i64,
            price_cents in 0i64..10_000_000i64,
        ) {
            let cost = Decimal::new(cost_cents, 2);
            let price = Decimal::new(price_cents, 2);

            let snapshot = ValuationSnapshot::compute(
                Uuid::new_v4(),
                date(2024, 1, 1),
                quantity,
                cost,
                price,
                ValuationMethod::Average,
            )
            .unwrap();

            prop_assert_eq!(snapshot.cost_value, Decimal::from(quantity) * cost);
            prop_assert_eq!(snapshot.market_value, Decimal::from(quantity) * price);
            prop_assert_eq!(snapshot.profit, snapshot.market_value - snapshot.cost_value);
            prop_assert!(snapshot.margin_pct.scale() <= 2);
        }
    }
}
