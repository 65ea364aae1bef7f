//! HTTP handlers for purchase batches

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::{CurrentUser, INVENTORY_WRITE};
use crate::models::{BatchStatus, BatchView};
use crate::services::batch::{BatchFilter, BatchReceiptResponse, CreateBatchInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBatchesQuery {
    pub material_id: Option<Uuid>,
    pub status: Option<BatchStatus>,
    #[serde(default)]
    pub include_inactive: bool,
}

/// Receive a purchase batch
pub async fn create_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<(StatusCode, Json<BatchReceiptResponse>)> {
    current_user.0.require(INVENTORY_WRITE)?;
    let receipt = state.batches().create(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// List batches with their derived status
pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<ListBatchesQuery>,
) -> AppResult<Json<Vec<BatchView>>> {
    let filter = BatchFilter {
        material_id: query.material_id,
        status: query.status,
        include_inactive: query.include_inactive,
    };
    Ok(Json(state.batches().list(&filter).await?))
}

/// Get a batch
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<BatchView>> {
    Ok(Json(state.batches().get(batch_id).await?))
}

/// Retire a batch from FIFO selection
pub async fn deactivate_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<BatchView>> {
    current_user.0.require(INVENTORY_WRITE)?;
    Ok(Json(state.batches().deactivate(batch_id).await?))
}

/// Return a retired batch to FIFO selection
pub async fn reactivate_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<BatchView>> {
    current_user.0.require(INVENTORY_WRITE)?;
    Ok(Json(state.batches().reactivate(batch_id).await?))
}
