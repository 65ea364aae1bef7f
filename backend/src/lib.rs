//! Print shop material ledger - backend library
//!
//! Raw-material stock kept as purchase batches, consumed FIFO, with every
//! change recorded as an immutable movement and rolled up into production job
//! costs.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

pub use config::Config;

use services::{BatchService, MaterialService, MovementService, ProductionService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    fn lock_timeout_ms(&self) -> u64 {
        self.config.database.lock_timeout_ms
    }

    pub fn materials(&self) -> MaterialService {
        MaterialService::new(self.db.clone()).with_lock_timeout(self.lock_timeout_ms())
    }

    pub fn batches(&self) -> BatchService {
        BatchService::new(self.db.clone()).with_lock_timeout(self.lock_timeout_ms())
    }

    pub fn movements(&self) -> MovementService {
        MovementService::new(self.db.clone()).with_lock_timeout(self.lock_timeout_ms())
    }

    pub fn production(&self) -> ProductionService {
        ProductionService::new(self.db.clone()).with_lock_timeout(self.lock_timeout_ms())
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Print Shop Material Ledger API v1.0"
}
