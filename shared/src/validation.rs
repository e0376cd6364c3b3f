//! Validation utilities for the stock ledger
//!
//! Caller-contract checks shared by the ledger and valuation services.

use rust_decimal::Decimal;

// ============================================================================
// Movement Validations
// ============================================================================

/// A movement must change stock by a non-zero amount
pub fn validate_movement_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity == 0 {
        return Err("Movement quantity must not be zero");
    }
    if quantity == i64::MIN {
        return Err("Movement quantity out of range");
    }
    Ok(())
}

/// An explicit unit price supplied with a movement must not be negative
pub fn validate_price_hint(price_hint: Option<Decimal>) -> Result<(), &'static str> {
    match price_hint {
        Some(price) if price < Decimal::ZERO => Err("Unit price cannot be negative"),
        _ => Ok(()),
    }
}

/// Reference cost and price of an item must not be negative
pub fn validate_item_pricing(cost: Decimal, price: Decimal) -> Result<(), &'static str> {
    if cost < Decimal::ZERO {
        return Err("Item cost cannot be negative");
    }
    if price < Decimal::ZERO {
        return Err("Item price cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Policy Validations
// ============================================================================

/// Discrepancy tolerance is an absolute amount and must not be negative
pub fn validate_tolerance(tolerance: Decimal) -> Result<(), &'static str> {
    if tolerance < Decimal::ZERO {
        return Err("Discrepancy tolerance cannot be negative");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_movement_quantity() {
        assert!(validate_movement_quantity(1).is_ok());
        assert!(validate_movement_quantity(-25).is_ok());
        assert!(validate_movement_quantity(0).is_err());
        assert!(validate_movement_quantity(i64::MIN).is_err());
    }

    #[test]
    fn test_validate_price_hint() {
        assert!(validate_price_hint(None).is_ok());
        assert!(validate_price_hint(Some(Decimal::ZERO)).is_ok());
        assert!(validate_price_hint(Some(dec!(12.50))).is_ok());
        assert!(validate_price_hint(Some(dec!(-0.01))).is_err());
    }

    #[test]
    fn test_validate_item_pricing() {
        assert!(validate_item_pricing(dec!(10), dec!(15)).is_ok());
        assert!(validate_item_pricing(dec!(-1), dec!(15)).is_err());
        assert!(validate_item_pricing(dec!(10), dec!(-15)).is_err());
    }

    #[test]
    fn test_validate_tolerance() {
        assert!(validate_tolerance(dec!(1000)).is_ok());
        assert!(validate_tolerance(Decimal::ZERO).is_ok());
        assert!(validate_tolerance(dec!(-1)).is_err());
    }
}
