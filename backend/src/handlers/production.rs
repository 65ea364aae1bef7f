//! HTTP handlers for production jobs and their costs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use shared::CostBreakdown;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::{CurrentUser, PRODUCTION_WRITE};
use crate::models::{JobStatus, ProductionCost, ProductionJob};
use crate::services::production::{
    AddConsumptionInput, ConsumptionResponse, CreateJobInput, TransitionInput, UpdateJobInput,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCostsQuery {
    pub job_id: Uuid,
}

/// Cost breakdown in the configured currency
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostTotalsResponse {
    #[serde(flatten)]
    pub breakdown: CostBreakdown,
    pub currency: String,
}

/// Queue a production job
pub async fn create_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateJobInput>,
) -> AppResult<(StatusCode, Json<ProductionJob>)> {
    current_user.0.require(PRODUCTION_WRITE)?;
    let job = state.production().create_job(input).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// List jobs, optionally by status
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> AppResult<Json<Vec<ProductionJob>>> {
    Ok(Json(state.production().list_jobs(query.status).await?))
}

/// Get a job
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<ProductionJob>> {
    Ok(Json(state.production().get_job(job_id).await?))
}

/// Edit a job's descriptive fields
pub async fn update_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
    Json(input): Json<UpdateJobInput>,
) -> AppResult<Json<ProductionJob>> {
    current_user.0.require(PRODUCTION_WRITE)?;
    Ok(Json(state.production().update_job(job_id, input).await?))
}

/// Move a job to another status
pub async fn transition_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
    Json(input): Json<TransitionInput>,
) -> AppResult<Json<ProductionJob>> {
    current_user.0.require(PRODUCTION_WRITE)?;
    Ok(Json(state.production().transition(job_id, input).await?))
}

/// Delete a job that is not in progress
pub async fn delete_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(PRODUCTION_WRITE)?;
    state.production().delete_job(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Charge material to a job
pub async fn add_consumption(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AddConsumptionInput>,
) -> AppResult<(StatusCode, Json<ConsumptionResponse>)> {
    current_user.0.require(PRODUCTION_WRITE)?;
    let response = state
        .production()
        .add_consumption(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Cost rows of a job
pub async fn list_costs(
    State(state): State<AppState>,
    Query(query): Query<JobCostsQuery>,
) -> AppResult<Json<Vec<ProductionCost>>> {
    Ok(Json(state.production().list_costs(query.job_id).await?))
}

/// Cost breakdown and suggested price of a job
pub async fn get_cost_totals(
    State(state): State<AppState>,
    Query(query): Query<JobCostsQuery>,
) -> AppResult<Json<CostTotalsResponse>> {
    let policy = state.config.costing.policy();
    let breakdown = state
        .production()
        .compute_totals(query.job_id, &policy)
        .await?;

    Ok(Json(CostTotalsResponse {
        breakdown,
        currency: state.config.costing.currency.clone(),
    }))
}
