pub mod distributions;
pub mod investments;
pub mod labels;
pub mod portfolios;
pub mod snapshots;

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// Standard success envelope
pub(crate) fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}
