//! Interpretation of provider JSON payloads.
//!
//! Every provider response wraps its data in a `body` object, and reports
//! business-level failure with a `status` marker either at the top level or
//! inside `body`, regardless of the HTTP status it answered with.

use serde_json::{json, Map, Value};

use crate::errors::OrchestrationError;
use crate::polling::StatusObservation;

const DETAIL_MAX_CHARS: usize = 512;

/// One-time upload slot: PUT target and the public URL it will serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSlot {
    pub upload_target_url: String,
    pub public_asset_url: String,
}

pub fn parse_upload_slot(payload: &Value) -> Result<UploadSlot, OrchestrationError> {
    let body = payload.get("body");
    let upload_target = body.and_then(|row| non_empty_str(row.get("uploadImage")));
    let public_asset = body.and_then(|row| non_empty_str(row.get("imageUrl")));
    match (upload_target, public_asset) {
        (Some(upload_target_url), Some(public_asset_url)) => Ok(UploadSlot {
            upload_target_url: upload_target_url.to_string(),
            public_asset_url: public_asset_url.to_string(),
        }),
        (target, public) => Err(OrchestrationError::InvalidUploadResponse {
            detail: json!({
                "uploadImage": target.is_some(),
                "imageUrl": public.is_some(),
            }),
        }),
    }
}

/// Extracts `body.orderId` from a 2xx generation response.
pub fn parse_job_id(payload: &Value) -> Result<String, OrchestrationError> {
    if let Some(detail) = failure_marker(payload) {
        return Err(OrchestrationError::ProviderRejected {
            status: provider_status_code(payload),
            detail,
        });
    }
    payload
        .get("body")
        .and_then(|row| non_empty_str(row.get("orderId")))
        .map(str::to_string)
        .ok_or_else(|| OrchestrationError::ProviderRejected {
            status: provider_status_code(payload),
            detail: json!({
                "message": "generation response carried no orderId",
                "response": truncate_value(payload),
            }),
        })
}

/// Reads one 2xx status response.
pub fn classify_status(payload: &Value) -> StatusObservation {
    if let Some(detail) = failure_marker(payload) {
        return StatusObservation::Failed { detail };
    }
    let body = payload.get("body");
    let status = body
        .and_then(|row| row.get("status"))
        .and_then(Value::as_str)
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match status.as_str() {
        "active" => match body.and_then(|row| non_empty_str(row.get("output"))) {
            Some(output) => StatusObservation::Active {
                output_url: output.to_string(),
            },
            None => StatusObservation::Failed {
                detail: json!({
                    "message": "job reported active without an output URL",
                    "response": truncate_value(payload),
                }),
            },
        },
        "failed" | "fail" | "error" => StatusObservation::Failed {
            detail: truncate_value(payload),
        },
        _ => StatusObservation::InProgress { status },
    }
}

/// Detail object when the payload carries a failure marker.
pub fn failure_marker(payload: &Value) -> Option<Value> {
    let marked = |row: &Value| {
        row.get("status")
            .and_then(Value::as_str)
            .map(|value| {
                matches!(
                    value.trim().to_ascii_uppercase().as_str(),
                    "FAIL" | "FAILED" | "ERROR"
                )
            })
            .unwrap_or(false)
    };
    let body = payload.get("body").filter(|row| row.is_object());
    if !marked(payload) && !body.map(marked).unwrap_or(false) {
        return None;
    }

    let mut detail = Map::new();
    for key in ["status", "message", "description", "statusCode"] {
        let value = payload
            .get(key)
            .or_else(|| body.and_then(|row| row.get(key)));
        if let Some(value) = value {
            detail.insert(key.to_string(), value.clone());
        }
    }
    Some(Value::Object(detail))
}

/// `statusCode` embedded in a payload, when it is a plausible HTTP code.
pub fn provider_status_code(payload: &Value) -> Option<u16> {
    payload
        .get("statusCode")
        .or_else(|| payload.get("body").and_then(|row| row.get("statusCode")))
        .and_then(|value| match value {
            Value::Number(num) => num.as_u64(),
            Value::String(text) => text.trim().parse::<u64>().ok(),
            _ => None,
        })
        .and_then(|code| u16::try_from(code).ok())
        .filter(|code| (100..=599).contains(code))
}

/// Error body as JSON when it parses, else wrapped as `{message}`.
pub fn error_detail_from_text(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(value) if value.is_object() || value.is_array() => value,
        _ => json!({ "message": truncate_text(text.trim(), DETAIL_MAX_CHARS) }),
    }
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn truncate_value(payload: &Value) -> Value {
    let rendered = payload.to_string();
    if rendered.chars().count() <= DETAIL_MAX_CHARS {
        return payload.clone();
    }
    Value::String(truncate_text(&rendered, DETAIL_MAX_CHARS))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
