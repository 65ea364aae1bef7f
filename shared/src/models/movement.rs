//! Inventory movement ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of stock-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Purchase,
    Consumption,
    Adjustment,
    Transfer,
    Waste,
    Return,
}

impl MovementType {
    pub const ALL: [MovementType; 6] = [
        MovementType::Purchase,
        MovementType::Consumption,
        MovementType::Adjustment,
        MovementType::Transfer,
        MovementType::Waste,
        MovementType::Return,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "PURCHASE",
            MovementType::Consumption => "CONSUMPTION",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::Transfer => "TRANSFER",
            MovementType::Waste => "WASTE",
            MovementType::Return => "RETURN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Consumption and waste take stock out and draw down a batch
    pub fn is_outbound(&self) -> bool {
        matches!(self, MovementType::Consumption | MovementType::Waste)
    }

    /// Only adjustments carry a caller-supplied sign
    pub fn accepts_signed_quantity(&self) -> bool {
        matches!(self, MovementType::Adjustment)
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable ledger entry. Corrections are new adjustments, never edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMovement {
    pub id: Uuid,
    /// Sequential display number, e.g. "MOV-00000042"
    pub movement_number: String,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub material_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub production_job_id: Option<Uuid>,
    /// Signed: negative for consumption and waste
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    /// Material stock immediately after this movement
    pub stock_after: Decimal,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub movement_date: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl InventoryMovement {
    /// Change this movement applied to the material's aggregate stock
    pub fn stock_delta(&self) -> Decimal {
        stock_delta(self.movement_type, self.quantity)
    }
}

/// Effect of a recorded (signed) quantity on aggregate stock. Transfers are
/// audit markers and leave the total untouched.
pub fn stock_delta(movement_type: MovementType, signed_quantity: Decimal) -> Decimal {
    match movement_type {
        MovementType::Transfer => Decimal::ZERO,
        _ => signed_quantity,
    }
}

pub fn format_movement_number(sequence: i64) -> String {
    format!("MOV-{:08}", sequence)
}

/// Flat projection used for CSV export
#[derive(Debug, Clone, Serialize)]
pub struct MovementCsvRow {
    pub movement_number: String,
    pub movement_type: &'static str,
    pub material_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub production_job_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub stock_after: Decimal,
    pub reference: Option<String>,
    pub movement_date: String,
}

impl From<&InventoryMovement> for MovementCsvRow {
    fn from(m: &InventoryMovement) -> Self {
        Self {
            movement_number: m.movement_number.clone(),
            movement_type: m.movement_type.as_str(),
            material_id: m.material_id,
            batch_id: m.batch_id,
            production_job_id: m.production_job_id,
            quantity: m.quantity,
            unit_cost: m.unit_cost,
            total_cost: m.total_cost,
            stock_after: m.stock_after,
            reference: m.reference.clone(),
            movement_date: m.movement_date.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_type_round_trip() {
        for t in MovementType::ALL {
            assert_eq!(MovementType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(MovementType::from_str("SALE"), None);
    }

    #[test]
    fn test_movement_type_serde_matches_db_names() {
        let json = serde_json::to_string(&MovementType::Consumption).unwrap();
        assert_eq!(json, "\"CONSUMPTION\"");
        let parsed: MovementType = serde_json::from_str("\"WASTE\"").unwrap();
        assert_eq!(parsed, MovementType::Waste);
    }

    #[test]
    fn test_outbound_types() {
        assert!(MovementType::Consumption.is_outbound());
        assert!(MovementType::Waste.is_outbound());
        assert!(!MovementType::Return.is_outbound());
        assert!(!MovementType::Adjustment.is_outbound());
    }

    #[test]
    fn test_transfer_has_no_stock_effect() {
        assert_eq!(stock_delta(MovementType::Transfer, Decimal::from(12)), Decimal::ZERO);
        assert_eq!(stock_delta(MovementType::Waste, Decimal::from(-3)), Decimal::from(-3));
    }

    #[test]
    fn test_movement_number_format() {
        assert_eq!(format_movement_number(7), "MOV-00000007");
    }
}
