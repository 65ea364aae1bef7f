//! Ledger error taxonomy
//!
//! Every rule in this crate fails with a [`LedgerError`]. The backend maps each
//! variant onto an HTTP status; nothing here is retried automatically.

use rust_decimal::Decimal;
use thiserror::Error;

/// Failures raised by ledger rules before any state is committed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid {field}: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("batch {batch_number} has {available} remaining, {requested} requested")]
    InsufficientQuantity {
        batch_number: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("material {material} has {available} in stock, {requested} requested")]
    InsufficientStock {
        material: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("{0} was modified concurrently")]
    ConcurrentModification(String),
}

impl LedgerError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        LedgerError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        LedgerError::NotFound(resource.into())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_resource() {
        let err = LedgerError::InsufficientQuantity {
            batch_number: "BATCH-000001".to_string(),
            requested: Decimal::from(60),
            available: Decimal::from(40),
        };
        assert_eq!(
            err.to_string(),
            "batch BATCH-000001 has 40 remaining, 60 requested"
        );
        assert_eq!(LedgerError::not_found("Material").to_string(), "Material not found");
    }
}
