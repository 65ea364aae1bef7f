//! Raw-material registry models and stock classification

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw-material SKU (filament spool, resin bottle, packaging...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Uuid,
    pub name: String,
    /// Category such as "PLA", "PETG", "RESIN"
    #[serde(rename = "type")]
    pub material_type: String,
    /// Unit of measure ("kg", "g", "l", "unit")
    pub unit: String,
    /// Aggregate quantity on hand
    pub stock: Decimal,
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    /// Weighted average cost of the stock on hand
    pub cost_per_unit: Decimal,
    pub supplier: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    pub fn status(&self) -> StockStatus {
        classify_material_stock(self.stock, self.min_stock, self.max_stock)
    }
}

/// Derived stock health, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Critical,
    Low,
    Normal,
    Overstock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Critical => "critical",
            StockStatus::Low => "low",
            StockStatus::Normal => "normal",
            StockStatus::Overstock => "overstock",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(StockStatus::Critical),
            "low" => Some(StockStatus::Low),
            "normal" => Some(StockStatus::Normal),
            "overstock" => Some(StockStatus::Overstock),
            _ => None,
        }
    }

    /// Critical and low stock need replenishing
    pub fn needs_attention(&self) -> bool {
        matches!(self, StockStatus::Critical | StockStatus::Low)
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify aggregate stock against the material's thresholds.
///
/// Checks run in order: empty stock is critical, at or below the minimum is
/// low, above a configured maximum is overstock, anything else is normal.
pub fn classify_material_stock(
    stock: Decimal,
    min_stock: Decimal,
    max_stock: Option<Decimal>,
) -> StockStatus {
    if stock <= Decimal::ZERO {
        StockStatus::Critical
    } else if stock <= min_stock {
        StockStatus::Low
    } else if max_stock.is_some_and(|max| stock > max) {
        StockStatus::Overstock
    } else {
        StockStatus::Normal
    }
}

/// Material with its derived status, as returned by read endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialView {
    #[serde(flatten)]
    pub material: Material,
    pub status: StockStatus,
}

impl From<Material> for MaterialView {
    fn from(material: Material) -> Self {
        let status = material.status();
        Self { material, status }
    }
}

/// Value of the stock on hand for one material
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialValuation {
    pub material_id: Uuid,
    pub stock: Decimal,
    /// Quantity held in active batches, valued at each batch's unit cost
    pub batched_quantity: Decimal,
    pub batched_value: Decimal,
    /// Stock not covered by any active batch, valued at the average cost
    pub unbatched_quantity: Decimal,
    pub unbatched_value: Decimal,
    pub total_value: Decimal,
}

/// Drift between the aggregate stock, the batches and the movement ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub material_id: Uuid,
    pub stock: Decimal,
    pub batch_total: Decimal,
    /// `stock - batch_total`
    pub drift: Decimal,
    pub last_stock_after: Option<Decimal>,
    /// Every movement's stock-after chains from its predecessor and the last
    /// one matches the live stock
    pub ledger_consistent: bool,
    /// First movement number that breaks the chain, if any
    pub first_break: Option<String>,
}
