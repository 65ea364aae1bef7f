//! Transaction and row-lock helpers shared by the ledger services
//!
//! Every write to a material or its batches takes the material row lock first,
//! so writes against one material are serialized while different materials
//! proceed in parallel. A lock that cannot be acquired within the configured
//! timeout surfaces as a concurrent-modification error and the whole
//! transaction rolls back.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    BatchRow, JobRow, Material, MaterialBatch, MaterialRow, ProductionJob, BATCH_COLUMNS,
    JOB_COLUMNS, MATERIAL_COLUMNS,
};

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

pub const BATCH_NUMBER_SEQ: &str = "material_batch_number_seq";
pub const MOVEMENT_NUMBER_SEQ: &str = "inventory_movement_number_seq";
pub const JOB_NUMBER_SEQ: &str = "production_job_number_seq";

/// Open a write transaction with a bounded lock wait
pub async fn begin_write(
    db: &PgPool,
    lock_timeout_ms: u64,
) -> AppResult<Transaction<'static, Postgres>> {
    let mut tx = db.begin().await?;
    // SET does not take bind parameters; the value is a plain integer
    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", lock_timeout_ms))
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Load and lock a material row for the rest of the transaction
pub async fn lock_material(conn: &mut PgConnection, material_id: Uuid) -> AppResult<Material> {
    let row = sqlx::query_as::<_, MaterialRow>(&format!(
        "SELECT {} FROM materials WHERE id = $1 FOR UPDATE",
        MATERIAL_COLUMNS
    ))
    .bind(material_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

    Ok(row.into())
}

/// Load and lock a batch row. Callers lock the owning material first.
pub async fn lock_batch(conn: &mut PgConnection, batch_id: Uuid) -> AppResult<MaterialBatch> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {} FROM material_batches WHERE id = $1 FOR UPDATE",
        BATCH_COLUMNS
    ))
    .bind(batch_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

    Ok(row.into())
}

/// Load and lock a production job row
pub async fn lock_job(conn: &mut PgConnection, job_id: Uuid) -> AppResult<ProductionJob> {
    let row = sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {} FROM production_jobs WHERE id = $1 FOR UPDATE",
        JOB_COLUMNS
    ))
    .bind(job_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Production job".to_string()))?;

    row.try_into()
}

/// Which material a batch belongs to, without locking it
pub async fn batch_material_id(conn: &mut PgConnection, batch_id: Uuid) -> AppResult<Uuid> {
    sqlx::query_scalar::<_, Uuid>("SELECT material_id FROM material_batches WHERE id = $1")
        .bind(batch_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))
}

/// Next value of a numbering sequence, drawn inside the inserting transaction
pub async fn next_number(conn: &mut PgConnection, sequence: &'static str) -> AppResult<i64> {
    let value = sqlx::query_scalar::<_, i64>(&format!("SELECT nextval('{}')", sequence))
        .fetch_one(&mut *conn)
        .await?;
    Ok(value)
}
