//! Success envelope

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// `{success: true, data, timestamp}`
pub fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": data,
        "timestamp": timestamp(),
    }))
}
