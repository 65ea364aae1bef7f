//! Purchase batch models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Batches expiring within this many days are flagged as near expiry
pub const NEAR_EXPIRY_DAYS: i64 = 30;

/// One purchased lot of a material with its own cost basis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialBatch {
    pub id: Uuid,
    /// Sequential display number, e.g. "BATCH-000042"
    pub batch_number: String,
    pub material_id: Uuid,
    pub purchase_date: NaiveDate,
    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
    pub original_qty: Decimal,
    pub current_qty: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaterialBatch {
    pub fn status(&self, today: NaiveDate) -> BatchStatus {
        classify_batch(self.is_active, self.expiry_date, self.current_qty, today)
    }

    pub fn usage_percentage(&self) -> Decimal {
        usage_percentage(self.original_qty, self.current_qty)
    }
}

/// Derived batch state, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    NearExpiry,
    Expired,
    Depleted,
    Inactive,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::NearExpiry => "near_expiry",
            BatchStatus::Expired => "expired",
            BatchStatus::Depleted => "depleted",
            BatchStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(BatchStatus::Active),
            "near_expiry" => Some(BatchStatus::NearExpiry),
            "expired" => Some(BatchStatus::Expired),
            "depleted" => Some(BatchStatus::Depleted),
            "inactive" => Some(BatchStatus::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a batch as of `today`.
///
/// Precedence: inactive, then expired, then near expiry, then depleted. An
/// expired lot with stock left is still reported as expired so it can be
/// written off.
pub fn classify_batch(
    is_active: bool,
    expiry_date: Option<NaiveDate>,
    current_qty: Decimal,
    today: NaiveDate,
) -> BatchStatus {
    if !is_active {
        return BatchStatus::Inactive;
    }
    if let Some(expiry) = expiry_date {
        if expiry < today {
            return BatchStatus::Expired;
        }
        if (expiry - today).num_days() <= NEAR_EXPIRY_DAYS {
            return BatchStatus::NearExpiry;
        }
    }
    if current_qty <= Decimal::ZERO {
        BatchStatus::Depleted
    } else {
        BatchStatus::Active
    }
}

/// Share of the original quantity already consumed, in percent (2 dp)
pub fn usage_percentage(original_qty: Decimal, current_qty: Decimal) -> Decimal {
    if original_qty <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((original_qty - current_qty) / original_qty * Decimal::ONE_HUNDRED).round_dp(2)
}

/// Cost basis of a whole lot, or `None` when the product overflows
pub fn batch_total_cost(original_qty: Decimal, unit_cost: Decimal) -> Option<Decimal> {
    original_qty.checked_mul(unit_cost)
}

pub fn format_batch_number(sequence: i64) -> String {
    format!("BATCH-{:06}", sequence)
}

/// Batch with its derived fields, as returned by read endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: MaterialBatch,
    pub status: BatchStatus,
    pub usage_percentage: Decimal,
}

impl BatchView {
    pub fn new(batch: MaterialBatch, today: NaiveDate) -> Self {
        let status = batch.status(today);
        let usage_percentage = batch.usage_percentage();
        Self {
            batch,
            status,
            usage_percentage,
        }
    }
}
