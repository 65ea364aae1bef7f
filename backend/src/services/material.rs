//! Material registry service

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use shared::ledger::{plan_movement, reconcile, valuate};
use shared::validation::{
    validate_positive_quantity, validate_required, validate_thresholds, validate_unit_cost,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    BatchRow, BatchStatus, BatchView, Material, MaterialBatch, MaterialRow, MaterialValuation,
    MaterialView, MovementType, ReconciliationReport, StockStatus, BATCH_COLUMNS,
    MATERIAL_COLUMNS,
};
use crate::services::locking::{begin_write, lock_material, DEFAULT_LOCK_TIMEOUT_MS};
use crate::services::movement::{apply_plan, material_history, MovementEntry};

/// Reference stamped on the movement that opens a material's ledger
pub const INITIAL_STOCK_REFERENCE: &str = "INITIAL_STOCK";

/// Material registry service
#[derive(Clone)]
pub struct MaterialService {
    db: PgPool,
    lock_timeout_ms: u64,
}

/// Input for registering a material
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaterialInput {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50, message = "type must be 1-50 characters"))]
    pub material_type: String,
    #[validate(length(min = 1, max = 20, message = "unit must be 1-20 characters"))]
    pub unit: String,
    #[serde(default)]
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    #[serde(default)]
    pub cost_per_unit: Decimal,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    /// Opening balance, recorded as an ADJUSTMENT movement
    pub initial_stock: Option<Decimal>,
}

/// Descriptive fields and thresholds. Stock and cost change only through
/// movements and purchases.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMaterialInput {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: Option<String>,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50, message = "type must be 1-50 characters"))]
    pub material_type: Option<String>,
    #[validate(length(min = 1, max = 20, message = "unit must be 1-20 characters"))]
    pub unit: Option<String>,
    pub min_stock: Option<Decimal>,
    /// Absent keeps the current ceiling, `null` removes it
    #[serde(default, deserialize_with = "present_or_null")]
    pub max_stock: Option<Option<Decimal>>,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<Decimal>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Decimal>::deserialize(deserializer).map(Some)
}

/// An opening balance is optional, but when given it must be a storable
/// positive quantity
fn validate_initial_stock(initial_stock: Option<Decimal>) -> AppResult<()> {
    match initial_stock {
        Some(q) if q < Decimal::ZERO => {
            Err(AppError::validation("initialStock", "cannot be negative"))
        }
        Some(q) if !q.is_zero() => Ok(validate_positive_quantity("initialStock", q)?),
        _ => Ok(()),
    }
}

#[derive(Debug, Default, Clone)]
pub struct MaterialFilter {
    pub material_type: Option<String>,
    pub status: Option<StockStatus>,
}

/// Materials running low and batches about to (or already) expire
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAlerts {
    pub low_stock: Vec<MaterialView>,
    pub expiring_batches: Vec<BatchView>,
}

/// Apply a delta to a material's aggregate stock, clamped at zero, and return
/// the new stock. The only statement that writes `materials.stock`.
pub async fn adjust_stock(
    conn: &mut PgConnection,
    material_id: Uuid,
    delta: Decimal,
) -> AppResult<Decimal> {
    sqlx::query_scalar::<_, Decimal>(
        r#"
        UPDATE materials
        SET stock = GREATEST(stock + $2, 0), updated_at = NOW()
        WHERE id = $1
        RETURNING stock
        "#,
    )
    .bind(material_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Material".to_string()))
}

impl MaterialService {
    /// Create a new MaterialService instance
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout_ms: u64) -> Self {
        self.lock_timeout_ms = lock_timeout_ms;
        self
    }

    /// Register a material, optionally with an opening balance
    pub async fn create(&self, user_id: Uuid, input: CreateMaterialInput) -> AppResult<MaterialView> {
        input.validate()?;
        validate_required("name", &input.name)?;
        validate_thresholds(input.min_stock, input.max_stock)?;
        validate_unit_cost("costPerUnit", input.cost_per_unit)?;
        validate_initial_stock(input.initial_stock)?;

        let mut tx = begin_write(&self.db, self.lock_timeout_ms).await?;

        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            r#"
            INSERT INTO materials (
                name, material_type, unit, min_stock, max_stock, cost_per_unit, supplier, location
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            MATERIAL_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.material_type)
        .bind(&input.unit)
        .bind(input.min_stock)
        .bind(input.max_stock)
        .bind(input.cost_per_unit)
        .bind(&input.supplier)
        .bind(&input.location)
        .fetch_one(&mut *tx)
        .await?;

        let mut material: Material = row.into();

        if let Some(initial) = input.initial_stock.filter(|q| *q != Decimal::ZERO) {
            let plan = plan_movement(&material, None, MovementType::Adjustment, initial)?;
            let movement = apply_plan(
                &mut tx,
                &material,
                &plan,
                MovementEntry {
                    reference: Some(INITIAL_STOCK_REFERENCE.to_string()),
                    created_by: Some(user_id),
                    ..Default::default()
                },
            )
            .await?;
            material.stock = movement.stock_after;
        }

        tx.commit().await?;

        tracing::info!(
            "Registered material {} ({}) with stock {} {}",
            material.name,
            material.id,
            material.stock,
            material.unit
        );
        Ok(material.into())
    }

    /// Get a material by ID
    pub async fn get(&self, material_id: Uuid) -> AppResult<MaterialView> {
        Ok(self.find(material_id).await?.into())
    }

    async fn find(&self, material_id: Uuid) -> AppResult<Material> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {} FROM materials WHERE id = $1",
            MATERIAL_COLUMNS
        ))
        .bind(material_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

        Ok(row.into())
    }

    /// List materials by name, optionally filtered by type and derived status
    pub async fn list(&self, filter: &MaterialFilter) -> AppResult<Vec<MaterialView>> {
        let rows = sqlx::query_as::<_, MaterialRow>(&format!(
            r#"
            SELECT {}
            FROM materials
            WHERE ($1::varchar IS NULL OR material_type = $1)
            ORDER BY name
            "#,
            MATERIAL_COLUMNS
        ))
        .bind(&filter.material_type)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MaterialView::from(Material::from(row)))
            .filter(|view| filter.status.map_or(true, |s| view.status == s))
            .collect())
    }

    /// Update descriptive fields and thresholds
    pub async fn update(
        &self,
        material_id: Uuid,
        input: UpdateMaterialInput,
    ) -> AppResult<MaterialView> {
        input.validate()?;
        if let Some(name) = &input.name {
            validate_required("name", name)?;
        }

        let mut tx = begin_write(&self.db, self.lock_timeout_ms).await?;
        let current = lock_material(&mut tx, material_id).await?;
        validate_thresholds(
            input.min_stock.unwrap_or(current.min_stock),
            input.max_stock.unwrap_or(current.max_stock),
        )?;

        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            r#"
            UPDATE materials SET
                name = COALESCE($2, name),
                material_type = COALESCE($3, material_type),
                unit = COALESCE($4, unit),
                min_stock = COALESCE($5, min_stock),
                max_stock = CASE WHEN $9 THEN $6 ELSE max_stock END,
                supplier = COALESCE($7, supplier),
                location = COALESCE($8, location),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MATERIAL_COLUMNS
        ))
        .bind(material_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.material_type)
        .bind(&input.unit)
        .bind(input.min_stock)
        .bind(input.max_stock.flatten())
        .bind(&input.supplier)
        .bind(&input.location)
        .bind(input.max_stock.is_some())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let material: Material = row.into();
        tracing::info!("Updated material {} ({})", material.name, material.id);
        Ok(material.into())
    }

    async fn batches_of(&self, material_id: Uuid) -> AppResult<Vec<MaterialBatch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM material_batches WHERE material_id = $1 ORDER BY purchase_date, batch_number",
            BATCH_COLUMNS
        ))
        .bind(material_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Compare aggregate stock with active batches and the movement ledger
    pub async fn reconcile(&self, material_id: Uuid) -> AppResult<ReconciliationReport> {
        let material = self.find(material_id).await?;
        let batches = self.batches_of(material_id).await?;
        let history = material_history(&self.db, material_id).await?;

        let report = reconcile(&material, &batches, &history);
        if !report.ledger_consistent {
            tracing::warn!(
                "Ledger for {} is inconsistent (first break: {:?})",
                material.name,
                report.first_break
            );
        }
        Ok(report)
    }

    /// Value the stock on hand
    pub async fn valuation(&self, material_id: Uuid) -> AppResult<MaterialValuation> {
        let material = self.find(material_id).await?;
        let batches = self.batches_of(material_id).await?;
        Ok(valuate(&material, &batches))
    }

    /// Low-stock materials and expiring batches that still hold stock
    pub async fn alerts(&self) -> AppResult<InventoryAlerts> {
        let low_stock = self
            .list(&MaterialFilter::default())
            .await?
            .into_iter()
            .filter(|view| view.status.needs_attention())
            .collect();

        let today = Utc::now().date_naive();
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            SELECT {}
            FROM material_batches
            WHERE is_active AND current_qty > 0 AND expiry_date IS NOT NULL
            ORDER BY expiry_date, batch_number
            "#,
            BATCH_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        let expiring_batches = rows
            .into_iter()
            .map(|row| BatchView::new(row.into(), today))
            .filter(|view| {
                matches!(view.status, BatchStatus::NearExpiry | BatchStatus::Expired)
            })
            .collect();

        Ok(InventoryAlerts {
            low_stock,
            expiring_batches,
        })
    }
}
