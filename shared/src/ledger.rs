//! Movement planning and ledger arithmetic
//!
//! A plan is computed against the locked material (and batch) rows before
//! anything is written. The backend applies a plan as a single transaction;
//! tests apply it to in-memory rows with [`MovementPlan::apply`].

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    batch_total_cost, InventoryMovement, Material, MaterialBatch, MaterialValuation,
    MovementType, ReconciliationReport,
};

/// Scale used for stored costs
pub const COST_SCALE: u32 = 4;

fn overflow(field: &str) -> LedgerError {
    LedgerError::invalid(field, "value is too large")
}

/// Quantity taken out of a batch by an outbound movement
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDraw {
    pub batch_id: Uuid,
    pub batch_number: String,
    pub quantity: Decimal,
    pub remaining_after: Decimal,
}

/// Everything a movement changes, computed up front
#[derive(Debug, Clone, PartialEq)]
pub struct MovementPlan {
    pub movement_type: MovementType,
    pub batch_id: Option<Uuid>,
    /// Recorded quantity: negative for outbound, the effective delta for
    /// adjustments
    pub signed_quantity: Decimal,
    /// Change to the material's aggregate stock
    pub stock_delta: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub stock_after: Decimal,
    pub batch_draw: Option<BatchDraw>,
}

impl MovementPlan {
    /// Apply to in-memory rows the same way the backend's UPDATEs do
    pub fn apply(&self, material: &mut Material, batch: Option<&mut MaterialBatch>) {
        material.stock = self.stock_after;
        if let (Some(draw), Some(batch)) = (&self.batch_draw, batch) {
            if batch.id == draw.batch_id {
                batch.current_qty = draw.remaining_after;
            }
        }
    }
}

/// Clamp a stock change at zero
pub fn clamp_stock(stock: Decimal, delta: Decimal) -> Decimal {
    (stock + delta).max(Decimal::ZERO)
}

/// Remaining batch quantity after drawing `quantity`.
///
/// Over-drawing is an error, never a silent clamp.
pub fn decrement_batch(batch: &MaterialBatch, quantity: Decimal) -> LedgerResult<Decimal> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid("quantity", "must be greater than zero"));
    }
    if quantity > batch.current_qty {
        return Err(LedgerError::InsufficientQuantity {
            batch_number: batch.batch_number.clone(),
            requested: quantity,
            available: batch.current_qty,
        });
    }
    Ok((batch.current_qty - quantity).max(Decimal::ZERO))
}

/// Average cost after receiving `quantity` at `unit_cost`
pub fn weighted_average_cost(
    stock: Decimal,
    cost_per_unit: Decimal,
    quantity: Decimal,
    unit_cost: Decimal,
) -> LedgerResult<Decimal> {
    let total_qty = stock
        .checked_add(quantity)
        .ok_or_else(|| overflow("quantity"))?;
    if total_qty <= Decimal::ZERO {
        return Ok(cost_per_unit);
    }
    let held_value = stock
        .checked_mul(cost_per_unit)
        .ok_or_else(|| overflow("costPerUnit"))?;
    let received_value = quantity
        .checked_mul(unit_cost)
        .ok_or_else(|| overflow("unitCost"))?;
    let total_value = held_value
        .checked_add(received_value)
        .ok_or_else(|| overflow("unitCost"))?;
    Ok((total_value / total_qty).round_dp(COST_SCALE))
}

/// Plan a movement of `quantity` against `material`.
///
/// `quantity` is unsigned for every type except ADJUSTMENT, which takes the
/// caller's sign. When a batch is involved the batch check runs before the
/// material stock check.
pub fn plan_movement(
    material: &Material,
    batch: Option<&MaterialBatch>,
    movement_type: MovementType,
    quantity: Decimal,
) -> LedgerResult<MovementPlan> {
    if movement_type.accepts_signed_quantity() {
        if quantity.is_zero() {
            return Err(LedgerError::invalid("quantity", "adjustment cannot be zero"));
        }
    } else if quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid("quantity", "must be greater than zero"));
    }
    crate::validation::validate_magnitude("quantity", quantity)?;
    if let Some(b) = batch {
        if b.material_id != material.id {
            return Err(LedgerError::invalid(
                "batchId",
                format!("batch {} belongs to another material", b.batch_number),
            ));
        }
    }

    let unit_cost = batch.map(|b| b.unit_cost).unwrap_or(material.cost_per_unit);
    let mut batch_draw = None;

    let signed_quantity = match movement_type {
        MovementType::Consumption | MovementType::Waste => {
            if let Some(b) = batch {
                if !b.is_active {
                    return Err(LedgerError::invalid(
                        "batchId",
                        format!("batch {} is inactive", b.batch_number),
                    ));
                }
                let remaining_after = decrement_batch(b, quantity)?;
                batch_draw = Some(BatchDraw {
                    batch_id: b.id,
                    batch_number: b.batch_number.clone(),
                    quantity,
                    remaining_after,
                });
            }
            if material.stock < quantity {
                return Err(LedgerError::InsufficientStock {
                    material: material.name.clone(),
                    requested: quantity,
                    available: material.stock,
                });
            }
            -quantity
        }
        MovementType::Purchase | MovementType::Return | MovementType::Transfer => quantity,
        MovementType::Adjustment => clamp_stock(material.stock, quantity) - material.stock,
    };

    let stock_delta = crate::models::stock_delta(movement_type, signed_quantity);
    let stock_after = clamp_stock(material.stock, stock_delta);
    crate::validation::validate_magnitude("quantity", stock_after)?;
    let total_cost = signed_quantity
        .abs()
        .checked_mul(unit_cost)
        .ok_or_else(|| overflow("quantity"))?
        .round_dp(COST_SCALE);

    Ok(MovementPlan {
        movement_type,
        batch_id: batch.map(|b| b.id),
        signed_quantity,
        stock_delta,
        unit_cost,
        total_cost,
        stock_after,
        batch_draw,
    })
}

/// Effects of receiving a new purchase batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReceipt {
    pub total_cost: Decimal,
    pub cost_per_unit_after: Decimal,
    pub movement: MovementPlan,
}

/// Plan the stock, cost and PURCHASE movement for a new batch
pub fn plan_batch_receipt(
    material: &Material,
    original_qty: Decimal,
    unit_cost: Decimal,
) -> LedgerResult<BatchReceipt> {
    crate::validation::validate_positive_quantity("originalQty", original_qty)?;
    crate::validation::validate_unit_cost("unitCost", unit_cost)?;

    let total_cost = batch_total_cost(original_qty, unit_cost)
        .ok_or_else(|| overflow("unitCost"))?
        .round_dp(COST_SCALE);
    let stock_after = material
        .stock
        .checked_add(original_qty)
        .ok_or_else(|| overflow("originalQty"))?;
    crate::validation::validate_magnitude("originalQty", stock_after)?;
    Ok(BatchReceipt {
        total_cost,
        cost_per_unit_after: weighted_average_cost(
            material.stock,
            material.cost_per_unit,
            original_qty,
            unit_cost,
        )?,
        movement: MovementPlan {
            movement_type: MovementType::Purchase,
            batch_id: None,
            signed_quantity: original_qty,
            stock_delta: original_qty,
            unit_cost,
            total_cost,
            stock_after,
            batch_draw: None,
        },
    })
}

/// Walk a material's movements oldest first and return the number of the
/// first one whose stock-after does not follow from its predecessor.
pub fn first_conservation_break(history: &[InventoryMovement]) -> Option<&str> {
    let mut running = Decimal::ZERO;
    for movement in history {
        running += movement.stock_delta();
        if movement.stock_after != running {
            return Some(movement.movement_number.as_str());
        }
    }
    None
}

/// Compare aggregate stock against active batches and the movement ledger
pub fn reconcile(
    material: &Material,
    batches: &[MaterialBatch],
    history: &[InventoryMovement],
) -> ReconciliationReport {
    let batch_total: Decimal = batches
        .iter()
        .filter(|b| b.material_id == material.id && b.is_active)
        .map(|b| b.current_qty)
        .sum();
    let last_stock_after = history.last().map(|m| m.stock_after);
    let first_break = first_conservation_break(history).map(str::to_string);
    let ledger_consistent =
        first_break.is_none() && last_stock_after.unwrap_or(Decimal::ZERO) == material.stock;

    ReconciliationReport {
        material_id: material.id,
        stock: material.stock,
        batch_total,
        drift: material.stock - batch_total,
        last_stock_after,
        ledger_consistent,
        first_break,
    }
}

/// Value stock on hand: batched quantity at each lot's cost, the rest at the
/// material's average cost.
pub fn valuate(material: &Material, batches: &[MaterialBatch]) -> MaterialValuation {
    let active = batches
        .iter()
        .filter(|b| b.material_id == material.id && b.is_active);
    let (batched_quantity, batched_value) = active.fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(qty, value), b| (qty + b.current_qty, value + b.current_qty * b.unit_cost),
    );
    let unbatched_quantity = (material.stock - batched_quantity).max(Decimal::ZERO);
    let unbatched_value = unbatched_quantity * material.cost_per_unit;
    let batched_value = batched_value.round_dp(COST_SCALE);
    let unbatched_value = unbatched_value.round_dp(COST_SCALE);

    MaterialValuation {
        material_id: material.id,
        stock: material.stock,
        batched_quantity,
        batched_value,
        unbatched_quantity,
        unbatched_value,
        total_value: batched_value + unbatched_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn material(stock: &str, cost: &str) -> Material {
        let now = Utc::now();
        Material {
            id: Uuid::new_v4(),
            name: "PLA Negro 1.75mm".to_string(),
            material_type: "PLA".to_string(),
            unit: "kg".to_string(),
            stock: dec(stock),
            min_stock: dec("5"),
            max_stock: None,
            cost_per_unit: dec(cost),
            supplier: None,
            location: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn batch_for(m: &Material, qty: &str, unit_cost: &str) -> MaterialBatch {
        let now = Utc::now();
        MaterialBatch {
            id: Uuid::new_v4(),
            batch_number: "BATCH-000001".to_string(),
            material_id: m.id,
            purchase_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            supplier: None,
            invoice_number: None,
            original_qty: dec("100"),
            current_qty: dec(qty),
            unit_cost: dec(unit_cost),
            total_cost: dec("250"),
            expiry_date: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_consumption_without_batch_checks_stock() {
        let m = material("30", "2");
        let err = plan_movement(&m, None, MovementType::Consumption, dec("40")).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { .. }));
    }

    #[test]
    fn test_consumption_with_batch_draws_it_down() {
        let m = material("100", "2");
        let b = batch_for(&m, "100", "2.50");
        let plan = plan_movement(&m, Some(&b), MovementType::Consumption, dec("30")).unwrap();
        assert_eq!(plan.signed_quantity, dec("-30"));
        assert_eq!(plan.stock_after, dec("70"));
        assert_eq!(plan.unit_cost, dec("2.50"));
        assert_eq!(plan.total_cost, dec("75"));
        assert_eq!(plan.batch_draw.unwrap().remaining_after, dec("70"));
    }

    #[test]
    fn test_batch_check_runs_before_stock_check() {
        let m = material("10", "2");
        let b = batch_for(&m, "40", "2");
        let err = plan_movement(&m, Some(&b), MovementType::Waste, dec("60")).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientQuantity { .. }));
    }

    #[test]
    fn test_adjustment_clamps_and_records_effective_delta() {
        let m = material("30", "2");
        let plan = plan_movement(&m, None, MovementType::Adjustment, dec("-50")).unwrap();
        assert_eq!(plan.signed_quantity, dec("-30"));
        assert_eq!(plan.stock_after, Decimal::ZERO);

        let plan = plan_movement(&m, None, MovementType::Adjustment, dec("5")).unwrap();
        assert_eq!(plan.stock_after, dec("35"));
    }

    #[test]
    fn test_transfer_leaves_stock_unchanged() {
        let m = material("30", "2");
        let plan = plan_movement(&m, None, MovementType::Transfer, dec("10")).unwrap();
        assert_eq!(plan.signed_quantity, dec("10"));
        assert_eq!(plan.stock_delta, Decimal::ZERO);
        assert_eq!(plan.stock_after, dec("30"));
    }

    #[test]
    fn test_return_ignores_batch_quantity() {
        let m = material("30", "2");
        let b = batch_for(&m, "0", "3");
        let plan = plan_movement(&m, Some(&b), MovementType::Return, dec("4")).unwrap();
        assert_eq!(plan.stock_after, dec("34"));
        assert_eq!(plan.batch_id, Some(b.id));
        assert!(plan.batch_draw.is_none());
        assert_eq!(plan.unit_cost, dec("3"));
    }

    #[test]
    fn test_rejects_non_positive_quantities() {
        let m = material("30", "2");
        assert!(plan_movement(&m, None, MovementType::Consumption, Decimal::ZERO).is_err());
        assert!(plan_movement(&m, None, MovementType::Purchase, dec("-1")).is_err());
        assert!(plan_movement(&m, None, MovementType::Adjustment, Decimal::ZERO).is_err());
    }

    #[test]
    fn test_foreign_batch_is_rejected() {
        let m = material("30", "2");
        let other = material("30", "2");
        let b = batch_for(&other, "30", "2");
        let err = plan_movement(&m, Some(&b), MovementType::Consumption, dec("1")).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument { .. }));
    }

    #[test]
    fn test_weighted_average_cost() {
        assert_eq!(
            weighted_average_cost(dec("10"), dec("2"), dec("10"), dec("4")).unwrap(),
            dec("3")
        );
        assert_eq!(
            weighted_average_cost(Decimal::ZERO, Decimal::ZERO, dec("5"), dec("2.5")).unwrap(),
            dec("2.5")
        );
        assert_eq!(
            weighted_average_cost(dec("3"), dec("1"), dec("6"), dec("2")).unwrap(),
            dec("1.6667")
        );
    }

    #[test]
    fn test_weighted_average_cost_overflow_is_an_error() {
        let huge = dec("100000000000000000000");
        let err = weighted_average_cost(huge, dec("10000000000"), dec("1"), dec("1")).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument { .. }));
    }

    #[test]
    fn test_batch_receipt() {
        let m = material("0", "0");
        let receipt = plan_batch_receipt(&m, dec("100"), dec("2.50")).unwrap();
        assert_eq!(receipt.total_cost, dec("250"));
        assert_eq!(receipt.movement.stock_after, dec("100"));
        assert_eq!(receipt.cost_per_unit_after, dec("2.5"));
        assert!(plan_batch_receipt(&m, Decimal::ZERO, dec("1")).is_err());
        assert!(plan_batch_receipt(&m, dec("1"), dec("-1")).is_err());
    }

    #[test]
    fn test_oversized_receipt_is_rejected() {
        let m = material("0", "0");
        let err =
            plan_batch_receipt(&m, dec("100000000000000000000"), dec("10000000000")).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument { .. }));

        // Each value fits but the resulting stock would not
        let m = material("9999999999", "1");
        let err = plan_batch_receipt(&m, dec("5"), dec("1")).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument { .. }));
    }

    #[test]
    fn test_oversized_movement_is_rejected() {
        let m = material("10", "10000");
        let huge = dec("10000000000000000000000000");
        for movement_type in [
            MovementType::Return,
            MovementType::Purchase,
            MovementType::Transfer,
            MovementType::Adjustment,
        ] {
            let err = plan_movement(&m, None, movement_type, huge).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidArgument { .. }));
        }
        let err = plan_movement(&m, None, MovementType::Adjustment, -huge).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument { .. }));
    }

    #[test]
    fn test_valuation_splits_batched_and_unbatched() {
        let m = material("120", "2");
        let b = batch_for(&m, "100", "2.50");
        let v = valuate(&m, &[b]);
        assert_eq!(v.batched_value, dec("250"));
        assert_eq!(v.unbatched_quantity, dec("20"));
        assert_eq!(v.unbatched_value, dec("40"));
        assert_eq!(v.total_value, dec("290"));
    }

    mod properties {
        use super::*;
        use crate::validation::MAX_MAGNITUDE;
        use proptest::prelude::*;

        fn any_decimal() -> impl Strategy<Value = Decimal> {
            (any::<i64>(), 0u32..=8).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
        }

        fn inbound_type() -> impl Strategy<Value = MovementType> {
            prop_oneof![
                Just(MovementType::Purchase),
                Just(MovementType::Return),
                Just(MovementType::Transfer),
                Just(MovementType::Adjustment),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn prop_receipt_fits_or_is_refused(
                qty in any_decimal(),
                cost in any_decimal(),
                stock in 0i64..10_000_000,
            ) {
                let m = material(&stock.to_string(), "2");
                match plan_batch_receipt(&m, qty, cost) {
                    Ok(receipt) => {
                        prop_assert!(receipt.movement.stock_after < MAX_MAGNITUDE);
                        prop_assert!(receipt.cost_per_unit_after >= Decimal::ZERO);
                    }
                    Err(err) => prop_assert!(matches!(err, LedgerError::InvalidArgument { .. }), "expected InvalidArgument"),
                }
            }

            #[test]
            fn prop_inbound_movement_fits_or_is_refused(
                movement_type in inbound_type(),
                qty in any_decimal(),
                cost in 0i64..100_000_000,
            ) {
                let m = material("10", &cost.to_string());
                match plan_movement(&m, None, movement_type, qty) {
                    Ok(plan) => prop_assert!(plan.stock_after < MAX_MAGNITUDE),
                    Err(err) => prop_assert!(matches!(err, LedgerError::InvalidArgument { .. }), "expected InvalidArgument"),
                }
            }
        }
    }
}
