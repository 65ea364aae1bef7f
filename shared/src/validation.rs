//! Input validation for ledger operations
//!
//! Stored quantities and costs are NUMERIC with four decimals; anything finer
//! would be silently rounded by the database, so it is rejected here.

use rust_decimal::Decimal;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::COST_SCALE;

pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 10;
pub const DEFAULT_PRIORITY: i32 = 5;

/// Exclusive bound of a NUMERIC(14, 4) quantity or cost column (10^10)
pub const MAX_MAGNITUDE: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

/// Exclusive bound of a NUMERIC(8, 2) hours column
pub const MAX_HOURS: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Reject values the ledger's columns cannot hold
pub fn validate_magnitude(field: &str, value: Decimal) -> LedgerResult<()> {
    if value.abs() >= MAX_MAGNITUDE {
        return Err(LedgerError::invalid(
            field,
            format!("must be smaller than {}", MAX_MAGNITUDE),
        ));
    }
    Ok(())
}

pub fn validate_scale(field: &str, value: Decimal) -> LedgerResult<()> {
    if value.normalize().scale() > COST_SCALE {
        return Err(LedgerError::invalid(
            field,
            format!("at most {} decimal places", COST_SCALE),
        ));
    }
    Ok(())
}

/// Quantities moved or purchased must be strictly positive
pub fn validate_positive_quantity(field: &str, quantity: Decimal) -> LedgerResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid(field, "must be greater than zero"));
    }
    validate_magnitude(field, quantity)?;
    validate_scale(field, quantity)
}

/// Costs may be zero (donated or sample stock) but never negative
pub fn validate_unit_cost(field: &str, cost: Decimal) -> LedgerResult<()> {
    if cost < Decimal::ZERO {
        return Err(LedgerError::invalid(field, "cannot be negative"));
    }
    validate_magnitude(field, cost)?;
    validate_scale(field, cost)
}

pub fn validate_thresholds(min_stock: Decimal, max_stock: Option<Decimal>) -> LedgerResult<()> {
    if min_stock < Decimal::ZERO {
        return Err(LedgerError::invalid("minStock", "cannot be negative"));
    }
    validate_magnitude("minStock", min_stock)?;
    validate_scale("minStock", min_stock)?;
    if let Some(max) = max_stock {
        validate_magnitude("maxStock", max)?;
        validate_scale("maxStock", max)?;
        if max < min_stock {
            return Err(LedgerError::invalid("maxStock", "must not be below minStock"));
        }
    }
    Ok(())
}

pub fn validate_priority(priority: i32) -> LedgerResult<()> {
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(LedgerError::invalid(
            "priority",
            format!("must be between {} and {}", MIN_PRIORITY, MAX_PRIORITY),
        ));
    }
    Ok(())
}

pub fn validate_hours(field: &str, hours: Option<Decimal>) -> LedgerResult<()> {
    match hours {
        Some(h) if h < Decimal::ZERO => Err(LedgerError::invalid(field, "cannot be negative")),
        Some(h) if h >= MAX_HOURS => Err(LedgerError::invalid(
            field,
            format!("must be smaller than {}", MAX_HOURS),
        )),
        _ => Ok(()),
    }
}

/// Required text such as a material or job name
pub fn validate_required(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::invalid(field, "is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_positive_quantity() {
        assert!(validate_positive_quantity("quantity", dec("0.5")).is_ok());
        assert!(validate_positive_quantity("quantity", Decimal::ZERO).is_err());
        assert!(validate_positive_quantity("quantity", dec("-2")).is_err());
    }

    #[test]
    fn test_scale_limit() {
        assert!(validate_positive_quantity("quantity", dec("1.2345")).is_ok());
        assert!(validate_positive_quantity("quantity", dec("1.23450000")).is_ok());
        assert!(validate_positive_quantity("quantity", dec("1.23456")).is_err());
    }

    #[test]
    fn test_magnitude_limit() {
        assert_eq!(MAX_MAGNITUDE, dec("10000000000"));
        assert!(validate_positive_quantity("quantity", dec("9999999999.9999")).is_ok());
        assert!(validate_positive_quantity("quantity", dec("10000000000")).is_err());
        assert!(validate_positive_quantity("quantity", dec("100000000000000000000")).is_err());
        assert!(validate_unit_cost("unitCost", dec("10000000000")).is_err());
        assert!(validate_magnitude("quantity", dec("-1000000000000")).is_err());
    }

    #[test]
    fn test_unit_cost_may_be_zero() {
        assert!(validate_unit_cost("unitCost", Decimal::ZERO).is_ok());
        assert!(validate_unit_cost("unitCost", dec("-0.01")).is_err());
    }

    #[test]
    fn test_thresholds() {
        assert!(validate_thresholds(dec("5"), Some(dec("50"))).is_ok());
        assert!(validate_thresholds(dec("5"), None).is_ok());
        assert!(validate_thresholds(dec("5"), Some(dec("4"))).is_err());
        assert!(validate_thresholds(dec("-1"), None).is_err());
        assert!(validate_thresholds(dec("1.23456"), None).is_err());
        assert!(validate_thresholds(dec("5"), Some(dec("50.00001"))).is_err());
        assert!(validate_thresholds(dec("5"), Some(dec("1000000000000"))).is_err());
    }

    #[test]
    fn test_priority_range() {
        assert!(validate_priority(1).is_ok());
        assert!(validate_priority(10).is_ok());
        assert!(validate_priority(0).is_err());
        assert!(validate_priority(11).is_err());
    }

    #[test]
    fn test_required_text() {
        assert!(validate_required("name", "PETG Blanco").is_ok());
        assert!(validate_required("name", "   ").is_err());
    }

    #[test]
    fn test_hours() {
        assert!(validate_hours("estimatedHours", None).is_ok());
        assert!(validate_hours("estimatedHours", Some(dec("1.5"))).is_ok());
        assert!(validate_hours("estimatedHours", Some(dec("-1"))).is_err());
        assert!(validate_hours("actualHours", Some(dec("1000000"))).is_err());
    }
}
