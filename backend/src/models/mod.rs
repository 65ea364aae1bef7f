//! Database row types
//!
//! Rows mirror the table columns; the shared crate owns the domain types they
//! convert into.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

pub use shared::models::*;

use crate::error::AppError;

pub const MATERIAL_COLUMNS: &str = "id, name, material_type, unit, stock, min_stock, max_stock, \
     cost_per_unit, supplier, location, created_at, updated_at";

pub const BATCH_COLUMNS: &str = "id, batch_number, material_id, purchase_date, supplier, \
     invoice_number, original_qty, current_qty, unit_cost, total_cost, expiry_date, is_active, \
     created_at, updated_at";

pub const MOVEMENT_COLUMNS: &str = "id, movement_number, movement_type, material_id, batch_id, \
     production_job_id, quantity, unit_cost, total_cost, stock_after, reference, notes, \
     movement_date, created_by";

pub const JOB_COLUMNS: &str = "id, job_number, name, status, priority, estimated_hours, \
     actual_hours, printer, material_label, settings, files, order_id, product_id, notes, \
     created_at, started_at, completed_at, updated_at";

pub const COST_COLUMNS: &str = "id, production_job_id, material_id, batch_id, quantity, \
     unit_cost, total_cost, notes, created_at";

#[derive(Debug, FromRow)]
pub struct MaterialRow {
    pub id: Uuid,
    pub name: String,
    pub material_type: String,
    pub unit: String,
    pub stock: Decimal,
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    pub cost_per_unit: Decimal,
    pub supplier: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MaterialRow> for Material {
    fn from(row: MaterialRow) -> Self {
        Material {
            id: row.id,
            name: row.name,
            material_type: row.material_type,
            unit: row.unit,
            stock: row.stock,
            min_stock: row.min_stock,
            max_stock: row.max_stock,
            cost_per_unit: row.cost_per_unit,
            supplier: row.supplier,
            location: row.location,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct BatchRow {
    pub id: Uuid,
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

impl From<BatchRow> for MaterialBatch {
    fn from(row: BatchRow) -> Self {
        MaterialBatch {
            id: row.id,
            batch_number: row.batch_number,
            material_id: row.material_id,
            purchase_date: row.purchase_date,
            supplier: row.supplier,
            invoice_number: row.invoice_number,
            original_qty: row.original_qty,
            current_qty: row.current_qty,
            unit_cost: row.unit_cost,
            total_cost: row.total_cost,
            expiry_date: row.expiry_date,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct MovementRow {
    pub id: Uuid,
    pub movement_number: String,
    pub movement_type: String,
    pub material_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub production_job_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub stock_after: Decimal,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub movement_date: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl TryFrom<MovementRow> for InventoryMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement_type = MovementType::from_str(&row.movement_type).ok_or_else(|| {
            AppError::Internal(format!("unknown movement type {}", row.movement_type))
        })?;
        Ok(InventoryMovement {
            id: row.id,
            movement_number: row.movement_number,
            movement_type,
            material_id: row.material_id,
            batch_id: row.batch_id,
            production_job_id: row.production_job_id,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            total_cost: row.total_cost,
            stock_after: row.stock_after,
            reference: row.reference,
            notes: row.notes,
            movement_date: row.movement_date,
            created_by: row.created_by,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub job_number: String,
    pub name: String,
    pub status: String,
    pub priority: i32,
    pub estimated_hours: Option<Decimal>,
    pub actual_hours: Option<Decimal>,
    pub printer: Option<String>,
    pub material_label: Option<String>,
    pub settings: Option<serde_json::Value>,
    pub files: Vec<String>,
    pub order_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for ProductionJob {
    type Error = AppError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = JobStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("unknown job status {}", row.status)))?;
        Ok(ProductionJob {
            id: row.id,
            job_number: row.job_number,
            name: row.name,
            status,
            priority: row.priority,
            estimated_hours: row.estimated_hours,
            actual_hours: row.actual_hours,
            printer: row.printer,
            material_label: row.material_label,
            settings: row.settings,
            files: row.files,
            order_id: row.order_id,
            product_id: row.product_id,
            notes: row.notes,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct CostRow {
    pub id: Uuid,
    pub production_job_id: Uuid,
    pub material_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CostRow> for ProductionCost {
    fn from(row: CostRow) -> Self {
        ProductionCost {
            id: row.id,
            production_job_id: row.production_job_id,
            material_id: row.material_id,
            batch_id: row.batch_id,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            total_cost: row.total_cost,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

/// Cost row joined with its material, input to the cost breakdown
#[derive(Debug, FromRow)]
pub struct CostLineRow {
    pub material_id: Uuid,
    pub material_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub total_cost: Decimal,
}

impl From<CostLineRow> for CostLine {
    fn from(row: CostLineRow) -> Self {
        CostLine {
            material_id: row.material_id,
            material_name: row.material_name,
            unit: row.unit,
            quantity: row.quantity,
            total_cost: row.total_cost,
        }
    }
}
