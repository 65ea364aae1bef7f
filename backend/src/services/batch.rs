//! Batch store service: purchase lots and their soft retirement

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::format_batch_number;
use shared::ledger::plan_batch_receipt;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{BatchRow, BatchStatus, BatchView, InventoryMovement, BATCH_COLUMNS};
use crate::services::locking::{
    batch_material_id, begin_write, lock_batch, lock_material, next_number,
    BATCH_NUMBER_SEQ, DEFAULT_LOCK_TIMEOUT_MS,
};
use crate::services::movement::{apply_plan, MovementEntry};

/// Batch store service
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
    lock_timeout_ms: u64,
}

/// Input for receiving a purchase batch
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchInput {
    pub material_id: Uuid,
    pub purchase_date: Option<NaiveDate>,
    pub original_qty: Decimal,
    pub unit_cost: Decimal,
    pub expiry_date: Option<NaiveDate>,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    #[validate(length(max = 100))]
    pub invoice_number: Option<String>,
}

/// A received batch together with the PURCHASE movement it produced
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReceiptResponse {
    pub batch: BatchView,
    pub movement: InventoryMovement,
}

#[derive(Debug, Default, Clone)]
pub struct BatchFilter {
    pub material_id: Option<Uuid>,
    pub status: Option<BatchStatus>,
    pub include_inactive: bool,
}

impl BatchService {
    /// Create a new BatchService instance
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

    /// Receive a purchase batch: stock, average cost and the PURCHASE
    /// movement change together or not at all
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateBatchInput,
    ) -> AppResult<BatchReceiptResponse> {
        input.validate()?;
        let today = Utc::now().date_naive();
        let purchase_date = input.purchase_date.unwrap_or(today);
        if let Some(expiry) = input.expiry_date {
            if expiry < purchase_date {
                return Err(AppError::validation(
                    "expiryDate",
                    "cannot be before the purchase date",
                ));
            }
        }

        let mut tx = begin_write(&self.db, self.lock_timeout_ms).await?;
        let material = lock_material(&mut tx, input.material_id).await?;
        let receipt = plan_batch_receipt(&material, input.original_qty, input.unit_cost)?;

        let batch_number = format_batch_number(next_number(&mut tx, BATCH_NUMBER_SEQ).await?);
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            INSERT INTO material_batches (
                batch_number, material_id, purchase_date, supplier, invoice_number,
                original_qty, current_qty, unit_cost, total_cost, expiry_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8, $9)
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(&batch_number)
        .bind(material.id)
        .bind(purchase_date)
        .bind(input.supplier.as_ref().or(material.supplier.as_ref()))
        .bind(&input.invoice_number)
        .bind(input.original_qty)
        .bind(input.unit_cost)
        .bind(receipt.total_cost)
        .bind(input.expiry_date)
        .fetch_one(&mut *tx)
        .await?;

        let mut plan = receipt.movement;
        plan.batch_id = Some(row.id);
        let movement = apply_plan(
            &mut tx,
            &material,
            &plan,
            MovementEntry {
                reference: input.invoice_number.clone().or_else(|| Some(batch_number.clone())),
                created_by: Some(user_id),
                ..Default::default()
            },
        )
        .await?;

        sqlx::query("UPDATE materials SET cost_per_unit = $2, updated_at = NOW() WHERE id = $1")
            .bind(material.id)
            .bind(receipt.cost_per_unit_after)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Received {} of {} {} at {} ({}), average cost now {}",
            batch_number,
            input.original_qty,
            material.name,
            input.unit_cost,
            movement.movement_number,
            receipt.cost_per_unit_after
        );

        Ok(BatchReceiptResponse {
            batch: BatchView::new(row.into(), today),
            movement,
        })
    }

    /// Get a batch by ID
    pub async fn get(&self, batch_id: Uuid) -> AppResult<BatchView> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM material_batches WHERE id = $1",
            BATCH_COLUMNS
        ))
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        Ok(BatchView::new(row.into(), Utc::now().date_naive()))
    }

    /// List batches in FIFO order
    pub async fn list(&self, filter: &BatchFilter) -> AppResult<Vec<BatchView>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            SELECT {}
            FROM material_batches
            WHERE ($1::uuid IS NULL OR material_id = $1)
              AND ($2 OR is_active)
            ORDER BY material_id, purchase_date, batch_number
            "#,
            BATCH_COLUMNS
        ))
        .bind(filter.material_id)
        .bind(filter.include_inactive || filter.status == Some(BatchStatus::Inactive))
        .fetch_all(&self.db)
        .await?;

        let today = Utc::now().date_naive();
        Ok(rows
            .into_iter()
            .map(|row| BatchView::new(row.into(), today))
            .filter(|view| filter.status.map_or(true, |s| view.status == s))
            .collect())
    }

    /// Batches of one material, oldest first
    pub async fn list_by_material(
        &self,
        material_id: Uuid,
        include_inactive: bool,
    ) -> AppResult<Vec<BatchView>> {
        self.list(&BatchFilter {
            material_id: Some(material_id),
            status: None,
            include_inactive,
        })
        .await
    }

    /// Retire a batch from FIFO selection without deleting it
    pub async fn deactivate(&self, batch_id: Uuid) -> AppResult<BatchView> {
        self.set_active(batch_id, false).await
    }

    /// Return a retired batch to FIFO selection
    pub async fn reactivate(&self, batch_id: Uuid) -> AppResult<BatchView> {
        self.set_active(batch_id, true).await
    }

    async fn set_active(&self, batch_id: Uuid, is_active: bool) -> AppResult<BatchView> {
        let mut tx = begin_write(&self.db, self.lock_timeout_ms).await?;
        let material_id = batch_material_id(&mut tx, batch_id).await?;
        lock_material(&mut tx, material_id).await?;
        lock_batch(&mut tx, batch_id).await?;

        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "UPDATE material_batches SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            BATCH_COLUMNS
        ))
        .bind(batch_id)
        .bind(is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Batch {} {}",
            row.batch_number,
            if is_active { "reactivated" } else { "deactivated" }
        );
        Ok(BatchView::new(row.into(), Utc::now().date_naive()))
    }
}
