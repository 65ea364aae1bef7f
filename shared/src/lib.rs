//! Shared domain types for the print shop material ledger
//!
//! Everything in this crate is pure: the backend persists and locks, the WASM
//! module previews, and both defer to the rules defined here for stock
//! classification, FIFO batch selection, movement planning and job costing.

pub mod error;
pub mod fifo;
pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
