//! Production jobs and their material costs

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::ledger::plan_movement;
use shared::validation::{
    validate_hours, validate_positive_quantity, validate_priority, validate_required,
    DEFAULT_PRIORITY,
};
use shared::{
    apply_transition, compute_totals, ensure_accepts_consumption, ensure_deletable,
    format_job_number, CostBreakdown, CostingPolicy, JobStatus,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    CostLineRow, CostRow, InventoryMovement, JobRow, MovementType, ProductionCost,
    ProductionJob, COST_COLUMNS, JOB_COLUMNS,
};
use crate::services::locking::{
    begin_write, lock_job, lock_material, next_number, DEFAULT_LOCK_TIMEOUT_MS, JOB_NUMBER_SEQ,
};
use crate::services::movement::{apply_plan, resolve_consumption_batch, MovementEntry};

/// Production job and costing service
#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
    lock_timeout_ms: u64,
}

/// Input for queueing a production job
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobInput {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,
    pub priority: Option<i32>,
    pub estimated_hours: Option<Decimal>,
    #[validate(length(max = 100))]
    pub printer: Option<String>,
    #[validate(length(max = 200))]
    pub material_label: Option<String>,
    pub settings: Option<serde_json::Value>,
    #[serde(default)]
    pub files: Vec<String>,
    pub order_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Editable job fields. Status changes go through [`ProductionService::transition`].
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobInput {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub estimated_hours: Option<Decimal>,
    pub actual_hours: Option<Decimal>,
    #[validate(length(max = 100))]
    pub printer: Option<String>,
    #[validate(length(max = 200))]
    pub material_label: Option<String>,
    pub settings: Option<serde_json::Value>,
    pub files: Option<Vec<String>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionInput {
    pub status: JobStatus,
    /// Reported print time; derived from the start time when omitted
    pub actual_hours: Option<Decimal>,
}

/// Input for charging material to a job
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddConsumptionInput {
    pub production_job_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub batch_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionResponse {
    pub cost: ProductionCost,
    pub movement: InventoryMovement,
}

impl ProductionService {
    /// Create a new ProductionService instance
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

    /// Queue a new job
    pub async fn create_job(&self, input: CreateJobInput) -> AppResult<ProductionJob> {
        input.validate()?;
        validate_required("name", &input.name)?;
        let priority = input.priority.unwrap_or(DEFAULT_PRIORITY);
        validate_priority(priority)?;
        validate_hours("estimatedHours", input.estimated_hours)?;

        let mut tx = self.db.begin().await?;
        let job_number = format_job_number(next_number(&mut tx, JOB_NUMBER_SEQ).await?);

        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            INSERT INTO production_jobs (
                job_number, name, priority, estimated_hours, printer, material_label,
                settings, files, order_id, product_id, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(&job_number)
        .bind(input.name.trim())
        .bind(priority)
        .bind(input.estimated_hours)
        .bind(&input.printer)
        .bind(&input.material_label)
        .bind(&input.settings)
        .bind(&input.files)
        .bind(input.order_id)
        .bind(input.product_id)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Queued production job {} ({})", job_number, input.name);
        row.try_into()
    }

    /// Get a job by ID
    pub async fn get_job(&self, job_id: Uuid) -> AppResult<ProductionJob> {
        sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM production_jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Production job".to_string()))?
        .try_into()
    }

    /// List jobs, highest priority first
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> AppResult<Vec<ProductionJob>> {
        sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {}
            FROM production_jobs
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY priority DESC, created_at
            "#,
            JOB_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(ProductionJob::try_from)
        .collect()
    }

    /// Update descriptive fields and hours
    pub async fn update_job(&self, job_id: Uuid, input: UpdateJobInput) -> AppResult<ProductionJob> {
        input.validate()?;
        if let Some(name) = &input.name {
            validate_required("name", name)?;
        }
        if let Some(priority) = input.priority {
            validate_priority(priority)?;
        }
        validate_hours("estimatedHours", input.estimated_hours)?;
        validate_hours("actualHours", input.actual_hours)?;

        let mut tx = begin_write(&self.db, self.lock_timeout_ms).await?;
        lock_job(&mut tx, job_id).await?;

        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE production_jobs SET
                name = COALESCE($2, name),
                priority = COALESCE($3, priority),
                estimated_hours = COALESCE($4, estimated_hours),
                actual_hours = COALESCE($5, actual_hours),
                printer = COALESCE($6, printer),
                material_label = COALESCE($7, material_label),
                settings = COALESCE($8, settings),
                files = COALESCE($9, files),
                notes = COALESCE($10, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.priority)
        .bind(input.estimated_hours)
        .bind(input.actual_hours)
        .bind(&input.printer)
        .bind(&input.material_label)
        .bind(&input.settings)
        .bind(&input.files)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Move a job through its lifecycle
    pub async fn transition(&self, job_id: Uuid, input: TransitionInput) -> AppResult<ProductionJob> {
        let mut tx = begin_write(&self.db, self.lock_timeout_ms).await?;
        let job = lock_job(&mut tx, job_id).await?;

        let change = apply_transition(&job, input.status, input.actual_hours, Utc::now())
            .inspect_err(|e| tracing::warn!("Rejected transition of {}: {}", job.job_number, e))?;

        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE production_jobs SET
                status = $2,
                started_at = $3,
                completed_at = $4,
                actual_hours = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(change.status.as_str())
        .bind(change.started_at)
        .bind(change.completed_at)
        .bind(change.actual_hours)
        .fetch_one(&mut *tx)
        .await?;

        if change.increments_product_stock {
            let updated = sqlx::query(
                "UPDATE products SET stock = stock + 1, updated_at = NOW() WHERE id = $1",
            )
            .bind(job.product_id)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                return Err(AppError::NotFound("Product".to_string()));
            }
        }

        tx.commit().await?;

        tracing::info!("Job {} {} -> {}", job.job_number, job.status, change.status);
        row.try_into()
    }

    /// Delete a job that is not running. Its costs go with it; movements stay
    /// in the ledger without the job reference.
    pub async fn delete_job(&self, job_id: Uuid) -> AppResult<()> {
        let mut tx = begin_write(&self.db, self.lock_timeout_ms).await?;
        let job = lock_job(&mut tx, job_id).await?;
        ensure_deletable(&job)?;

        sqlx::query("DELETE FROM production_jobs WHERE id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Deleted production job {}", job.job_number);
        Ok(())
    }

    /// Charge material to a job: FIFO batch (or the pinned one), a frozen cost
    /// row and a CONSUMPTION movement tagged with the job
    pub async fn add_consumption(
        &self,
        user_id: Uuid,
        input: AddConsumptionInput,
    ) -> AppResult<ConsumptionResponse> {
        input.validate()?;
        validate_positive_quantity("quantity", input.quantity)?;

        let mut tx = begin_write(&self.db, self.lock_timeout_ms).await?;
        let job = lock_job(&mut tx, input.production_job_id).await?;
        ensure_accepts_consumption(&job)?;

        let material = lock_material(&mut tx, input.material_id).await?;
        let batch =
            resolve_consumption_batch(&mut tx, &material, input.quantity, input.batch_id).await?;
        let plan = plan_movement(
            &material,
            batch.as_ref(),
            MovementType::Consumption,
            input.quantity,
        )
        .inspect_err(|e| {
            tracing::warn!("Rejected consumption for {}: {}", job.job_number, e)
        })?;

        let movement = apply_plan(
            &mut tx,
            &material,
            &plan,
            MovementEntry {
                production_job_id: Some(job.id),
                reference: Some(job.job_number.clone()),
                notes: input.notes.clone(),
                created_by: Some(user_id),
                ..Default::default()
            },
        )
        .await?;

        let cost = sqlx::query_as::<_, CostRow>(&format!(
            r#"
            INSERT INTO production_costs (
                production_job_id, material_id, batch_id, quantity, unit_cost, total_cost, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            COST_COLUMNS
        ))
        .bind(job.id)
        .bind(material.id)
        .bind(plan.batch_id)
        .bind(input.quantity)
        .bind(plan.unit_cost)
        .bind(plan.total_cost)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Charged {} {} of {} to {} at {} ({})",
            input.quantity,
            material.unit,
            material.name,
            job.job_number,
            plan.unit_cost,
            movement.movement_number
        );

        Ok(ConsumptionResponse {
            cost: cost.into(),
            movement,
        })
    }

    /// Cost rows of a job, oldest first
    pub async fn list_costs(&self, job_id: Uuid) -> AppResult<Vec<ProductionCost>> {
        self.get_job(job_id).await?;
        let rows = sqlx::query_as::<_, CostRow>(&format!(
            "SELECT {} FROM production_costs WHERE production_job_id = $1 ORDER BY created_at",
            COST_COLUMNS
        ))
        .bind(job_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Cost breakdown and suggested price, computed on demand
    pub async fn compute_totals(
        &self,
        job_id: Uuid,
        policy: &CostingPolicy,
    ) -> AppResult<CostBreakdown> {
        let job = self.get_job(job_id).await?;
        let lines = sqlx::query_as::<_, CostLineRow>(
            r#"
            SELECT pc.material_id, m.name AS material_name, m.unit, pc.quantity, pc.total_cost
            FROM production_costs pc
            JOIN materials m ON m.id = pc.material_id
            WHERE pc.production_job_id = $1
            ORDER BY pc.created_at
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        Ok(compute_totals(&job, lines, policy)?)
    }
}
