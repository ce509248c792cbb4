use serde_json::{json, Value};

use super::messages::{NormalizedMessage, Sender};
use super::{created_at, error_text, joined_text, model_ids};

pub const PROCESSING_PLACEHOLDER: &str = "*(正在处理中…)*";
pub const EMPTY_REPLY_PLACEHOLDER: &str = "*(无回复内容)*";

const TOOL_PART_TYPES: [&str; 2] = ["tool", "tool_call"];

/// Body for the engine's send-message endpoint.
pub fn outbound_payload(
    provider_id: &str,
    model_id: &str,
    mode: Option<&str>,
    text: &str,
) -> Value {
    let mut payload = json!({
        "model": {
            "providerID": provider_id,
            "modelID": model_id,
        },
        "parts": [{"type": "text", "text": text}],
    });
    if let Some(mode) = mode {
        payload["mode"] = Value::String(mode.to_string());
    }
    payload
}

/// Normalize the engine's answer to a sent message.
///
/// `provider_id`/`model_id` are what the caller asked for; the engine's echo
/// wins when present.
pub fn normalize_reply(payload: &Value, provider_id: &str, model_id: &str) -> NormalizedMessage {
    let info = payload.get("info");
    let parts = payload.get("parts");

    let mut text = joined_text(parts);
    if text.is_empty() {
        let has_tool_call = parts
            .and_then(Value::as_array)
            .is_some_and(|parts| {
                parts.iter().any(|p| {
                    p.get("type")
                        .and_then(Value::as_str)
                        .is_some_and(|t| TOOL_PART_TYPES.contains(&t))
                })
            });
        text = if has_tool_call {
            PROCESSING_PLACEHOLDER
        } else {
            EMPTY_REPLY_PLACEHOLDER
        }
        .to_string();
    }

    let mut is_error = false;
    if let Some(error) = error_text(info) {
        text = error;
        is_error = true;
    }

    let (echoed_provider, echoed_model) = model_ids(info);
    let timestamp = created_at(info);

    NormalizedMessage {
        text,
        sender: Sender::Assistant,
        timestamp,
        provider_id: Some(echoed_provider.unwrap_or_else(|| provider_id.to_string())),
        model_id: Some(echoed_model.unwrap_or_else(|| model_id.to_string())),
        is_error,
    }
}
