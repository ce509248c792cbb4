//! Reshape raw engine payloads into the gateway's stable JSON shapes.
//!
//! The engine is not assumed stable: collection endpoints may answer with a
//! bare array or with an object wrapping the array under a named field, and
//! both are accepted everywhere.

pub mod messages;
pub mod reply;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::engine::EngineError;

pub use messages::{simplify_messages, NormalizedMessage, Sender};
pub use reply::{normalize_reply, outbound_payload};

pub const ERROR_PREFIX: &str = "**错误：** ";
pub const UNKNOWN_ERROR: &str = "未知错误";
pub const UNTITLED: &str = "Untitled";

/// A collection as the engine may return it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing {
    Bare(Vec<Value>),
    Wrapped(Map<String, Value>),
}

/// Unwrap `payload` into its items, looking under `field` when the engine
/// wrapped the array in an object.
pub fn collection(payload: Value, field: &'static str) -> Result<Vec<Value>, EngineError> {
    let listing: Listing =
        serde_json::from_value(payload).map_err(|e| EngineError::Decode(e.to_string()))?;
    match listing {
        Listing::Bare(items) => Ok(items),
        Listing::Wrapped(mut obj) => match obj.remove(field) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(EngineError::MissingField(field)),
        },
    }
}

/// Provider catalogue, verbatim.
pub fn providers(payload: Value) -> Result<Vec<Value>, EngineError> {
    collection(payload, "providers")
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
}

/// Engine sessions restricted to `owned`, in the engine's order.
pub fn owned_sessions(
    payload: Value,
    owned: &[String],
) -> Result<Vec<SessionSummary>, EngineError> {
    let sessions = collection(payload, "sessions")?;
    Ok(sessions
        .iter()
        .filter_map(|s| {
            let id = s.get("id")?.as_str()?;
            if !owned.iter().any(|o| o == id) {
                return None;
            }
            let title = s
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or(UNTITLED);
            Some(SessionSummary {
                id: id.to_string(),
                title: title.to_string(),
            })
        })
        .collect())
}

/// Concatenate the `text` of every `type == "text"` part, in order.
pub(crate) fn joined_text(parts: Option<&Value>) -> String {
    parts
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Display text for an `info.error` descriptor, if one is present.
///
/// Message lookup order: `error.data.message`, `error.message`, then a
/// generic fallback.
pub(crate) fn error_text(info: Option<&Value>) -> Option<String> {
    let error = info?.get("error").filter(|e| !e.is_null())?;
    let message = error
        .get("data")
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .or_else(|| error.get("message").and_then(Value::as_str))
        .unwrap_or(UNKNOWN_ERROR);
    Some(format!("{ERROR_PREFIX}{message}"))
}

/// `info.time.created`, kept as the engine's number.
pub(crate) fn created_at(info: Option<&Value>) -> Option<Number> {
    match info?.get("time")?.get("created")? {
        Value::Number(n) => Some(n.clone()),
        _ => None,
    }
}

/// `(providerID, modelID)` from flat `info` fields, falling back to the
/// nested `info.model` object.
pub(crate) fn model_ids(info: Option<&Value>) -> (Option<String>, Option<String>) {
    let lookup = |key: &str| -> Option<String> {
        let info = info?;
        info.get(key)
            .and_then(Value::as_str)
            .or_else(|| info.get("model").and_then(|m| m.get(key)).and_then(Value::as_str))
            .map(str::to_string)
    };
    (lookup("providerID"), lookup("modelID"))
}
