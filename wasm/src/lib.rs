//! WebAssembly module for the print shop material ledger
//!
//! Lets the storefront classify stock and quote prices offline with the same
//! rules the server applies.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

fn to_decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

/// Stock status of a material (critical, low, normal or overstock)
#[wasm_bindgen]
pub fn classify_material_stock(stock: f64, min_stock: f64, max_stock: Option<f64>) -> String {
    shared::models::classify_material_stock(
        to_decimal(stock),
        to_decimal(min_stock),
        max_stock.map(to_decimal),
    )
    .as_str()
    .to_string()
}

/// Status of a batch (camelCase JSON) as of `today` (YYYY-MM-DD)
#[wasm_bindgen]
pub fn classify_batch(batch_json: &str, today: &str) -> Result<String, JsValue> {
    let batch: MaterialBatch = serde_json::from_str(batch_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid batch JSON: {}", e)))?;
    let today = NaiveDate::parse_from_str(today, "%Y-%m-%d")
        .map_err(|e| JsValue::from_str(&format!("Invalid date: {}", e)))?;

    Ok(batch.status(today).as_str().to_string())
}

/// Percentage of a batch already consumed
#[wasm_bindgen]
pub fn batch_usage_percentage(original_qty: f64, current_qty: f64) -> f64 {
    usage_percentage(to_decimal(original_qty), to_decimal(current_qty))
        .to_f64()
        .unwrap_or(0.0)
}

/// Suggested selling price, as a decimal string with two places
#[wasm_bindgen]
pub fn suggested_price(
    material_cost: f64,
    labor_hours: f64,
    labor_rate_per_hour: f64,
    margin: f64,
) -> Result<String, JsValue> {
    let policy = CostingPolicy {
        labor_rate_per_hour: to_decimal(labor_rate_per_hour),
        margin: to_decimal(margin),
    };
    let quote = policy
        .quote(to_decimal(material_cost), to_decimal(labor_hours))
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(format!("{:.2}", quote.suggested_price))
}

#[wasm_bindgen]
pub fn format_batch_number(sequence: i64) -> String {
    shared::models::format_batch_number(sequence)
}

#[wasm_bindgen]
pub fn format_movement_number(sequence: i64) -> String {
    shared::models::format_movement_number(sequence)
}
