//! Route definitions for the material ledger API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - material registry
        .nest("/materials", material_routes(state.clone()))
        // Protected routes - stock alerts
        .nest("/inventory", inventory_routes(state.clone()))
        // Protected routes - batch store
        .nest("/batches", batch_routes(state.clone()))
        // Protected routes - movement ledger
        .nest("/movements", movement_routes(state.clone()))
        // Protected routes - production jobs
        .nest("/production-jobs", job_routes(state.clone()))
        // Protected routes - production costs
        .nest("/production-costs", cost_routes(state))
}

/// Material registry routes (protected)
fn material_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_materials).post(handlers::create_material),
        )
        .route(
            "/:material_id",
            get(handlers::get_material).put(handlers::update_material),
        )
        .route("/:material_id/batches", get(handlers::get_material_batches))
        .route(
            "/:material_id/movements",
            get(handlers::get_material_movements),
        )
        .route(
            "/:material_id/reconciliation",
            get(handlers::get_reconciliation),
        )
        .route("/:material_id/valuation", get(handlers::get_valuation))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Inventory alert routes (protected)
fn inventory_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/alerts", get(handlers::get_alerts))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Batch store routes (protected)
fn batch_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::create_batch))
        .route("/:batch_id", get(handlers::get_batch))
        .route("/:batch_id/deactivate", post(handlers::deactivate_batch))
        .route("/:batch_id/reactivate", post(handlers::reactivate_batch))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Movement ledger routes (protected)
fn movement_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_movements).post(handlers::record_movement),
        )
        .route("/consume", post(handlers::consume_material))
        .route("/:movement_id", get(handlers::get_movement))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Production job routes (protected)
fn job_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_jobs).post(handlers::create_job))
        .route(
            "/:job_id",
            get(handlers::get_job)
                .put(handlers::update_job)
                .delete(handlers::delete_job),
        )
        .route("/:job_id/status", post(handlers::transition_job))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Production cost routes (protected)
fn cost_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_costs).post(handlers::add_consumption),
        )
        .route("/totals", get(handlers::get_cost_totals))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
