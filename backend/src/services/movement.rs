//! Movement ledger service
//!
//! Every stock change is written as an immutable movement in the same
//! transaction that updates the material and, for outbound movements, the
//! batch it draws from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::fifo::{select_fifo_batch, validate_pinned_batch};
use shared::ledger::{plan_movement, MovementPlan};
use shared::validation::validate_positive_quantity;
use shared::{format_movement_number, PaginatedResponse, Pagination, PaginationMeta};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    BatchRow, InventoryMovement, Material, MaterialBatch, MovementCsvRow, MovementRow, MovementType,
    BATCH_COLUMNS, MOVEMENT_COLUMNS,
};
use crate::services::locking::{
    begin_write, lock_batch, lock_material, next_number, DEFAULT_LOCK_TIMEOUT_MS,
    MOVEMENT_NUMBER_SEQ,
};
use crate::services::material::adjust_stock;

/// Movement ledger service
#[derive(Clone)]
pub struct MovementService {
    db: PgPool,
    lock_timeout_ms: u64,
}

/// Input for recording a movement directly
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordMovementInput {
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub material_id: Uuid,
    /// Unsigned, except for ADJUSTMENT where the sign is the direction
    pub quantity: Decimal,
    pub batch_id: Option<Uuid>,
    #[validate(length(max = 200, message = "reference must be at most 200 characters"))]
    pub reference: Option<String>,
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,
    pub movement_date: Option<DateTime<Utc>>,
}

/// Input for a FIFO consumption, e.g. material sold over the counter
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeInput {
    pub material_id: Uuid,
    pub quantity: Decimal,
    /// Draw from this batch instead of the oldest one
    pub batch_id: Option<Uuid>,
    /// CONSUMPTION (default) or WASTE
    #[serde(rename = "type")]
    pub movement_type: Option<MovementType>,
    #[validate(length(max = 200, message = "reference must be at most 200 characters"))]
    pub reference: Option<String>,
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// Filters for listing movements
#[derive(Debug, Default, Clone)]
pub struct MovementFilter {
    pub material_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub production_job_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Descriptive fields attached to a planned movement
#[derive(Debug, Default)]
pub struct MovementEntry {
    pub production_job_id: Option<Uuid>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub movement_date: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
}

/// Apply a plan computed against the locked material (and batch) rows.
///
/// The batch draw is guarded so a batch can never go below zero even if a
/// caller forgot to lock it.
pub async fn apply_plan(
    conn: &mut PgConnection,
    material: &Material,
    plan: &MovementPlan,
    entry: MovementEntry,
) -> AppResult<InventoryMovement> {
    if let Some(draw) = &plan.batch_draw {
        let updated = sqlx::query(
            r#"
            UPDATE material_batches
            SET current_qty = current_qty - $2, updated_at = NOW()
            WHERE id = $1 AND current_qty >= $2
            "#,
        )
        .bind(draw.batch_id)
        .bind(draw.quantity)
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::InsufficientQuantity {
                batch_number: draw.batch_number.clone(),
                requested: draw.quantity,
                available: draw.remaining_after + draw.quantity,
            });
        }
    }

    let stock_after = adjust_stock(&mut *conn, material.id, plan.stock_delta).await?;
    if stock_after != plan.stock_after {
        return Err(AppError::ConcurrentModification(format!(
            "material {} changed while the movement was planned",
            material.name
        )));
    }

    let number = format_movement_number(next_number(&mut *conn, MOVEMENT_NUMBER_SEQ).await?);
    let row = sqlx::query_as::<_, MovementRow>(&format!(
        r#"
        INSERT INTO inventory_movements (
            movement_number, movement_type, material_id, batch_id, production_job_id,
            quantity, unit_cost, total_cost, stock_after, reference, notes,
            movement_date, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, COALESCE($12, NOW()), $13)
        RETURNING {}
        "#,
        MOVEMENT_COLUMNS
    ))
    .bind(&number)
    .bind(plan.movement_type.as_str())
    .bind(material.id)
    .bind(plan.batch_id)
    .bind(entry.production_job_id)
    .bind(plan.signed_quantity)
    .bind(plan.unit_cost)
    .bind(plan.total_cost)
    .bind(stock_after)
    .bind(entry.reference)
    .bind(entry.notes)
    .bind(entry.movement_date)
    .bind(entry.created_by)
    .fetch_one(&mut *conn)
    .await?;

    row.try_into()
}

/// Batch an outbound movement should draw from: the pinned one, or the
/// oldest eligible batch. `None` means the material is not tracked in batches.
pub async fn resolve_consumption_batch(
    conn: &mut PgConnection,
    material: &Material,
    quantity: Decimal,
    pinned: Option<Uuid>,
) -> AppResult<Option<MaterialBatch>> {
    if let Some(batch_id) = pinned {
        let batch = lock_batch(&mut *conn, batch_id).await?;
        validate_pinned_batch(&batch, material.id)?;
        return Ok(Some(batch));
    }

    let candidates: Vec<MaterialBatch> = sqlx::query_as::<_, BatchRow>(&format!(
        r#"
        SELECT {}
        FROM material_batches
        WHERE material_id = $1 AND is_active AND current_qty > 0
        ORDER BY purchase_date, batch_number
        LIMIT 1
        FOR UPDATE
        "#,
        BATCH_COLUMNS
    ))
    .bind(material.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Into::into)
    .collect();

    Ok(select_fifo_batch(&candidates, quantity)?.cloned())
}

impl MovementService {
    /// Create a new MovementService instance
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

    /// Record a movement against an optional pinned batch. Never allocates
    /// FIFO; use [`MovementService::consume`] for that.
    pub async fn record(
        &self,
        user_id: Uuid,
        input: RecordMovementInput,
    ) -> AppResult<InventoryMovement> {
        input.validate()?;
        validate_positive_quantity("quantity", input.quantity.abs())?;

        let mut tx = begin_write(&self.db, self.lock_timeout_ms).await?;
        let material = lock_material(&mut tx, input.material_id).await?;
        let batch = match input.batch_id {
            Some(batch_id) => Some(lock_batch(&mut tx, batch_id).await?),
            None => None,
        };

        let plan = plan_movement(&material, batch.as_ref(), input.movement_type, input.quantity)
            .inspect_err(|e| {
                tracing::warn!("Rejected {} for {}: {}", input.movement_type, material.name, e)
            })?;

        let movement = apply_plan(
            &mut tx,
            &material,
            &plan,
            MovementEntry {
                reference: input.reference,
                notes: input.notes,
                movement_date: input.movement_date,
                created_by: Some(user_id),
                ..Default::default()
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Recorded {} {} of {} for {} (stock {})",
            movement.movement_number,
            movement.movement_type,
            movement.quantity,
            material.name,
            movement.stock_after
        );
        Ok(movement)
    }

    /// Consume material from its oldest batch (or the pinned one)
    pub async fn consume(&self, user_id: Uuid, input: ConsumeInput) -> AppResult<InventoryMovement> {
        input.validate()?;
        let movement_type = input.movement_type.unwrap_or(MovementType::Consumption);
        if !movement_type.is_outbound() {
            return Err(AppError::validation("type", "must be CONSUMPTION or WASTE"));
        }
        validate_positive_quantity("quantity", input.quantity)?;

        let mut tx = begin_write(&self.db, self.lock_timeout_ms).await?;
        let material = lock_material(&mut tx, input.material_id).await?;
        let batch =
            resolve_consumption_batch(&mut tx, &material, input.quantity, input.batch_id).await?;

        let plan = plan_movement(&material, batch.as_ref(), movement_type, input.quantity)
            .inspect_err(|e| tracing::warn!("Rejected consumption of {}: {}", material.name, e))?;

        let movement = apply_plan(
            &mut tx,
            &material,
            &plan,
            MovementEntry {
                reference: input.reference,
                notes: input.notes,
                created_by: Some(user_id),
                ..Default::default()
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Consumed {} of {} from {} as {}",
            input.quantity,
            material.name,
            batch
                .as_ref()
                .map(|b| b.batch_number.as_str())
                .unwrap_or("unbatched stock"),
            movement.movement_number
        );
        Ok(movement)
    }

    /// Get a movement by ID
    pub async fn get(&self, movement_id: Uuid) -> AppResult<InventoryMovement> {
        let row = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {} FROM inventory_movements WHERE id = $1",
            MOVEMENT_COLUMNS
        ))
        .bind(movement_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Movement".to_string()))?;

        row.try_into()
    }

    /// List movements newest first
    pub async fn list(
        &self,
        filter: &MovementFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<InventoryMovement>> {
        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR material_id = $1)
              AND ($2::varchar IS NULL OR movement_type = $2)
              AND ($3::uuid IS NULL OR production_job_id = $3)
              AND ($4::timestamptz IS NULL OR movement_date >= $4)
              AND ($5::timestamptz IS NULL OR movement_date <= $5)
        "#;
        let movement_type = filter.movement_type.map(|t| t.as_str());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM inventory_movements {}",
            WHERE
        ))
        .bind(filter.material_id)
        .bind(movement_type)
        .bind(filter.production_job_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {} FROM inventory_movements {} ORDER BY movement_date DESC, seq DESC LIMIT $6 OFFSET $7",
            MOVEMENT_COLUMNS, WHERE
        ))
        .bind(filter.material_id)
        .bind(movement_type)
        .bind(filter.production_job_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(InventoryMovement::try_from)
            .collect::<AppResult<Vec<InventoryMovement>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(pagination, total.max(0) as u64),
        })
    }

    /// Full ledger of one material in the order it was written
    pub async fn history(&self, material_id: Uuid) -> AppResult<Vec<InventoryMovement>> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM materials WHERE id = $1)")
                .bind(material_id)
                .fetch_one(&self.db)
                .await?;
        if !exists {
            return Err(AppError::NotFound("Material".to_string()));
        }

        material_history(&self.db, material_id).await
    }

    /// Render movements as CSV, one row per movement
    pub fn export_csv(movements: &[InventoryMovement]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for movement in movements {
            wtr.serialize(MovementCsvRow::from(movement))
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

/// Movements of a material oldest first
pub async fn material_history(
    db: &PgPool,
    material_id: Uuid,
) -> AppResult<Vec<InventoryMovement>> {
    sqlx::query_as::<_, MovementRow>(&format!(
        "SELECT {} FROM inventory_movements WHERE material_id = $1 ORDER BY seq",
        MOVEMENT_COLUMNS
    ))
    .bind(material_id)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(InventoryMovement::try_from)
    .collect()
}
