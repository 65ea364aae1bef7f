//! Error handling for the material ledger server
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::LedgerError;
use thiserror::Error;

/// PostgreSQL SQLSTATEs that mean another transaction got in the way
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_es: String },

    #[error("Insufficient permissions: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ledger rule violations
    #[error("Insufficient batch quantity in {batch_number}")]
    InsufficientQuantity {
        batch_number: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Insufficient stock of {material}")]
    InsufficientStock {
        material: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            field: field.into(),
            message_es: format!("Dato inválido: {}", message),
            message,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(resource) => AppError::NotFound(resource),
            LedgerError::InvalidArgument { field, message } => AppError::validation(field, message),
            LedgerError::InsufficientQuantity {
                batch_number,
                requested,
                available,
            } => AppError::InsufficientQuantity {
                batch_number,
                requested,
                available,
            },
            LedgerError::InsufficientStock {
                material,
                requested,
                available,
            } => AppError::InsufficientStock {
                material,
                requested,
                available,
            },
            LedgerError::InvalidStateTransition(msg) => AppError::InvalidStateTransition(msg),
            LedgerError::ConcurrentModification(resource) => {
                AppError::ConcurrentModification(resource)
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if matches!(
                    code.as_ref(),
                    SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE
                ) {
                    return AppError::ConcurrentModification(db_err.message().to_string());
                }
            }
        }
        AppError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("body".to_string(), "is invalid".to_string()));
        AppError::validation(field, message)
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientQuantity { .. } => StatusCode::BAD_REQUEST,
            AppError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidStateTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConcurrentModification(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            AppError::Unauthorized {
                message,
                message_es,
            } => ErrorDetail {
                code: "UNAUTHORIZED".to_string(),
                message_en: message.clone(),
                message_es: message_es.clone(),
                field: None,
            },
            AppError::Forbidden(permission) => ErrorDetail {
                code: "FORBIDDEN".to_string(),
                message_en: format!("Permission denied: requires {}", permission),
                message_es: format!("Permiso denegado: se requiere {}", permission),
                field: None,
            },
            AppError::Validation {
                field,
                message,
                message_es,
            } => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message_en: message.clone(),
                message_es: message_es.clone(),
                field: Some(field.clone()),
            },
            AppError::NotFound(resource) => ErrorDetail {
                code: "NOT_FOUND".to_string(),
                message_en: format!("{} not found", resource),
                message_es: format!("No se encontró {}", resource),
                field: None,
            },
            AppError::InsufficientQuantity {
                batch_number,
                requested,
                available,
            } => ErrorDetail {
                code: "INSUFFICIENT_QUANTITY".to_string(),
                message_en: format!(
                    "Batch {} has {} remaining, {} requested",
                    batch_number, available, requested
                ),
                message_es: format!(
                    "El lote {} tiene {} disponible, se solicitó {}",
                    batch_number, available, requested
                ),
                field: Some("quantity".to_string()),
            },
            AppError::InsufficientStock {
                material,
                requested,
                available,
            } => ErrorDetail {
                code: "INSUFFICIENT_STOCK".to_string(),
                message_en: format!(
                    "{} has {} in stock, {} requested",
                    material, available, requested
                ),
                message_es: format!(
                    "Stock insuficiente de {}: {} disponible, se solicitó {}",
                    material, available, requested
                ),
                field: Some("quantity".to_string()),
            },
            AppError::InvalidStateTransition(msg) => ErrorDetail {
                code: "INVALID_STATE_TRANSITION".to_string(),
                message_en: msg.clone(),
                message_es: format!("No se puede cambiar el estado: {}", msg),
                field: None,
            },
            AppError::ConcurrentModification(_) => ErrorDetail {
                code: "CONCURRENT_MODIFICATION".to_string(),
                message_en: "The record was modified by another request, please retry"
                    .to_string(),
                message_es: "El registro fue modificado por otra solicitud, intente de nuevo"
                    .to_string(),
                field: None,
            },
            AppError::DatabaseError(_) => ErrorDetail {
                code: "DATABASE_ERROR".to_string(),
                message_en: "A database error occurred".to_string(),
                message_es: "Ocurrió un error en la base de datos".to_string(),
                field: None,
            },
            AppError::Internal(msg) => ErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message_en: msg.clone(),
                message_es: "Error interno del servidor".to_string(),
                field: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: self.detail() })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
