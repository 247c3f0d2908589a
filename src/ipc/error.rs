use serde_json::json;
use tracing::warn;

use crate::service::FeeError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Render a domain error onto the wire. Storage failures keep a generic
/// message on the wire; the source is logged here instead.
pub fn fee_err(id: &str, e: &FeeError) -> serde_json::Value {
    if let FeeError::Storage(source) = e {
        warn!(error = %source, "storage operation failed");
    }
    err(id, e.code(), e.to_string(), e.details())
}
