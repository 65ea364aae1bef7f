//! HTTP handlers for the material registry

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::{CurrentUser, INVENTORY_WRITE};
use crate::models::{
    BatchView, InventoryMovement, MaterialValuation, MaterialView, ReconciliationReport,
    StockStatus,
};
use crate::services::material::{
    CreateMaterialInput, InventoryAlerts, MaterialFilter, UpdateMaterialInput,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListMaterialsQuery {
    #[serde(rename = "type")]
    pub material_type: Option<String>,
    pub status: Option<StockStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialBatchesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Register a material
pub async fn create_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateMaterialInput>,
) -> AppResult<(StatusCode, Json<MaterialView>)> {
    current_user.0.require(INVENTORY_WRITE)?;
    let material = state.materials().create(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

/// List materials with their stock status
pub async fn list_materials(
    State(state): State<AppState>,
    Query(query): Query<ListMaterialsQuery>,
) -> AppResult<Json<Vec<MaterialView>>> {
    let filter = MaterialFilter {
        material_type: query.material_type,
        status: query.status,
    };
    Ok(Json(state.materials().list(&filter).await?))
}

/// Get a material
pub async fn get_material(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<MaterialView>> {
    Ok(Json(state.materials().get(material_id).await?))
}

/// Update a material's descriptive fields and thresholds
pub async fn update_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
    Json(input): Json<UpdateMaterialInput>,
) -> AppResult<Json<MaterialView>> {
    current_user.0.require(INVENTORY_WRITE)?;
    Ok(Json(state.materials().update(material_id, input).await?))
}

/// Compare stock against batches and the movement ledger
pub async fn get_reconciliation(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<ReconciliationReport>> {
    Ok(Json(state.materials().reconcile(material_id).await?))
}

/// Value a material's stock on hand
pub async fn get_valuation(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<MaterialValuation>> {
    Ok(Json(state.materials().valuation(material_id).await?))
}

/// Movement history of a material, oldest first
pub async fn get_material_movements(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<Vec<InventoryMovement>>> {
    Ok(Json(state.movements().history(material_id).await?))
}

/// Batches of a material in FIFO order
pub async fn get_material_batches(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
    Query(query): Query<MaterialBatchesQuery>,
) -> AppResult<Json<Vec<BatchView>>> {
    let batches = state
        .batches()
        .list_by_material(material_id, query.include_inactive)
        .await?;
    Ok(Json(batches))
}

/// Low-stock materials and expiring batches
pub async fn get_alerts(State(state): State<AppState>) -> AppResult<Json<InventoryAlerts>> {
    Ok(Json(state.materials().alerts().await?))
}
