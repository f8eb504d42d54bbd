//! The persisted slice of the chat store: messages, per-message votes and the
//! session rating, stored as one versioned JSON blob.
//!
//! Older blobs wrote timestamps as date strings, so loading rewrites every
//! timestamp to epoch milliseconds before deserializing.

use crate::db::models::{now_millis, ChatFeedback, Message, MessageFeedback};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATE_KEY: &str = "chatbot-widget-storage";
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub feedback: Vec<MessageFeedback>,
    #[serde(default)]
    pub chat_feedback: Option<ChatFeedback>,
}

impl PersistedState {
    pub fn to_blob(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_blob(blob: &str) -> serde_json::Result<Self> {
        let mut value: Value = serde_json::from_str(blob)?;
        normalize(&mut value);
        serde_json::from_value(value)
    }
}

fn normalize(value: &mut Value) {
    let loaded_at = now_millis();
    if let Some(messages) = value.get_mut("messages").and_then(Value::as_array_mut) {
        for msg in messages {
            if let Some(obj) = msg.as_object_mut() {
                let ts = obj.get("timestamp").and_then(to_millis).unwrap_or_else(|| {
                    tracing::warn!("message without a readable timestamp; using load time");
                    loaded_at
                });
                obj.insert("timestamp".into(), Value::from(ts));
            }
        }
    }
    if let Some(chat) = value.get_mut("chat_feedback").and_then(Value::as_object_mut) {
        let ts = chat
            .get("submitted_at")
            .and_then(to_millis)
            .unwrap_or(loaded_at);
        chat.insert("submitted_at".into(), Value::from(ts));
    }
}

/// Read a timestamp stored as a number, a numeric string or an RFC 3339 date.
pub fn to_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return Some(n);
            }
            if let Ok(f) = s.parse::<f64>() {
                return Some(f as i64);
            }
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.timestamp_millis())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamps_normalized_from_any_shape() {
        let blob = json!({
            "messages": [
                {"id": "a", "content": "x", "sender": "user", "timestamp": 1700000000000i64},
                {"id": "b", "content": "y", "sender": "bot", "timestamp": "2023-11-14T22:13:20.000Z"},
                {"id": "c", "content": "z", "sender": "bot", "timestamp": "1700000000123"},
                {"id": "d", "content": "w", "sender": "bot", "timestamp": 1700000000000.7}
            ],
            "feedback": [{"message_id": "b", "vote": "upvote"}],
            "chat_feedback": {"rating": 4, "comment": "ok", "submitted_at": "2023-11-14T22:13:20Z"}
        })
        .to_string();

        let state = PersistedState::from_blob(&blob).unwrap();
        let ts: Vec<i64> = state.messages.iter().map(|m| m.timestamp).collect();
        assert_eq!(
            ts,
            vec![1700000000000, 1700000000000, 1700000000123, 1700000000000]
        );
        assert_eq!(state.chat_feedback.unwrap().submitted_at, 1700000000000);
        assert_eq!(state.feedback.len(), 1);
    }

    #[test]
    fn test_missing_timestamp_uses_load_time() {
        let before = now_millis();
        let blob = r#"{"messages":[{"id":"a","content":"x","sender":"user"}]}"#;
        let state = PersistedState::from_blob(blob).unwrap();
        assert!(state.messages[0].timestamp >= before);
    }

    #[test]
    fn test_blob_roundtrip_keeps_state() {
        let state = PersistedState {
            messages: vec![Message {
                id: "m1".into(),
                content: "hello".into(),
                sender: crate::db::models::Sender::Bot,
                timestamp: 42,
                files: vec![],
                state: Default::default(),
                feedback: None,
            }],
            feedback: vec![],
            chat_feedback: None,
        };
        let back = PersistedState::from_blob(&state.to_blob().unwrap()).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_garbage_blob_is_an_error() {
        assert!(PersistedState::from_blob("not json").is_err());
    }
}
