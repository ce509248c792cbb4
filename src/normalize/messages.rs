use serde::Serialize;
use serde_json::{Number, Value};

use super::{created_at, error_text, joined_text, model_ids};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Only `"user"` maps to [`Sender::User`]; system and tool turns display
    /// as the assistant.
    pub fn from_role(role: Option<&str>) -> Self {
        match role {
            Some("user") => Sender::User,
            _ => Sender::Assistant,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NormalizedMessage {
    pub text: String,
    pub sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Number>,
    #[serde(rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(rename = "modelID", skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

/// Simplify one raw engine message. Returns `None` for messages with neither
/// text nor an error, such as tool-only turns.
pub fn simplify_message(raw: &Value) -> Option<NormalizedMessage> {
    let info = raw.get("info");
    let role = info
        .and_then(|i| i.get("role"))
        .and_then(Value::as_str)
        .or_else(|| raw.get("role").and_then(Value::as_str));
    let timestamp = created_at(info);
    let (provider_id, model_id) = model_ids(info);

    let mut text = joined_text(raw.get("parts"));
    let mut is_error = false;
    if text.is_empty() {
        text = error_text(info)?;
        is_error = true;
    }

    Some(NormalizedMessage {
        text,
        sender: Sender::from_role(role),
        timestamp,
        provider_id,
        model_id,
        is_error,
    })
}

pub fn simplify_messages(items: &[Value]) -> Vec<NormalizedMessage> {
    items.iter().filter_map(simplify_message).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_message_is_kept() {
        let raw = json!({
            "info": {"role": "user", "time": {"created": 1718000000000u64}},
            "parts": [{"type": "text", "text": "hi"}]
        });
        let msg = simplify_message(&raw).unwrap();
        assert_eq!(msg.text, "hi");
        assert_eq!(msg.sender, Sender::User);
        assert!(!msg.is_error);
        assert_eq!(msg.timestamp, Some(Number::from(1718000000000u64)));
    }

    #[test]
    fn empty_message_with_error_becomes_error_entry() {
        let raw = json!({
            "info": {"role": "assistant", "error": {"message": "timeout"}},
            "parts": []
        });
        let out = simplify_messages(&[raw]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "**错误：** timeout");
        assert!(out[0].is_error);
    }

    #[test]
    fn empty_message_without_error_is_dropped() {
        let raw = json!({"info": {"role": "assistant"}, "parts": []});
        assert!(simplify_messages(&[raw]).is_empty());

        let tool_only = json!({
            "info": {"role": "assistant"},
            "parts": [{"type": "tool", "tool": "read", "state": {"status": "completed"}}]
        });
        assert!(simplify_message(&tool_only).is_none());
    }

    #[test]
    fn text_wins_over_error_descriptor() {
        let raw = json!({
            "info": {"role": "assistant", "error": {"message": "aborted"}},
            "parts": [{"type": "text", "text": "partial answer"}]
        });
        let msg = simplify_message(&raw).unwrap();
        assert_eq!(msg.text, "partial answer");
        assert!(!msg.is_error);
    }

    #[test]
    fn info_role_takes_precedence_over_top_level() {
        let raw = json!({
            "role": "user",
            "info": {"role": "assistant"},
            "parts": [{"type": "text", "text": "x"}]
        });
        assert_eq!(simplify_message(&raw).unwrap().sender, Sender::Assistant);

        let raw = json!({"role": "user", "parts": [{"type": "text", "text": "x"}]});
        assert_eq!(simplify_message(&raw).unwrap().sender, Sender::User);
    }

    #[test]
    fn non_user_roles_display_as_assistant() {
        for role in ["system", "tool", "assistant"] {
            assert_eq!(Sender::from_role(Some(role)), Sender::Assistant);
        }
        assert_eq!(Sender::from_role(None), Sender::Assistant);
    }

    #[test]
    fn model_info_is_read_from_flat_or_nested_fields() {
        let assistant = json!({
            "info": {"role": "assistant", "providerID": "openai", "modelID": "gpt-4o"},
            "parts": [{"type": "text", "text": "a"}]
        });
        let user = json!({
            "info": {"role": "user", "model": {"providerID": "openai", "modelID": "gpt-4o-mini"}},
            "parts": [{"type": "text", "text": "q"}]
        });
        let out = simplify_messages(&[user, assistant]);
        assert_eq!(out[0].model_id.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(out[1].model_id.as_deref(), Some("gpt-4o"));
        assert_eq!(out[1].provider_id.as_deref(), Some("openai"));
    }

    #[test]
    fn serializes_with_frontend_field_names() {
        let msg = NormalizedMessage {
            text: "hi".into(),
            sender: Sender::Assistant,
            timestamp: None,
            provider_id: Some("openai".into()),
            model_id: Some("gpt-4o".into()),
            is_error: false,
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            v,
            json!({
                "text": "hi",
                "sender": "assistant",
                "providerID": "openai",
                "modelID": "gpt-4o",
                "isError": false
            })
        );
    }
}
