//! HTTP handlers for the movement ledger

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::Pagination;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{CurrentUser, INVENTORY_WRITE};
use crate::models::{InventoryMovement, MovementType};
use crate::services::movement::{ConsumeInput, MovementFilter, RecordMovementInput};
use crate::services::MovementService;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMovementsQuery {
    pub material_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub movement_type: Option<MovementType>,
    pub production_job_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub format: Option<String>,
}

/// Record a movement
pub async fn record_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RecordMovementInput>,
) -> AppResult<(StatusCode, Json<InventoryMovement>)> {
    current_user.0.require(INVENTORY_WRITE)?;
    let movement = state.movements().record(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Consume material from its oldest batch
pub async fn consume_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ConsumeInput>,
) -> AppResult<(StatusCode, Json<InventoryMovement>)> {
    current_user.0.require(INVENTORY_WRITE)?;
    let movement = state.movements().consume(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// List movements, as JSON pages or as a CSV export of the requested page
pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<ListMovementsQuery>,
) -> AppResult<Response> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(AppError::validation("from", "must not be after 'to'"));
        }
    }

    let filter = MovementFilter {
        material_id: query.material_id,
        movement_type: query.movement_type,
        production_job_id: query.production_job_id,
        from: query.from,
        to: query.to,
    };
    let pagination = Pagination::new(query.page, query.per_page);
    let page = state.movements().list(&filter, &pagination).await?;

    if query.format.as_deref() == Some("csv") {
        let csv = MovementService::export_csv(&page.data)?;
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"movements.csv\"",
                ),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(page).into_response())
    }
}

/// Get a movement
pub async fn get_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<InventoryMovement>> {
    Ok(Json(state.movements().get(movement_id).await?))
}
