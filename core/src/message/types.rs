// Message types — application messages exchanged over the broadcast channel

use crate::peer::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type of user-visible chat text
pub const CHAT_KIND: &str = "chat";

/// An application message as recorded in the local log.
///
/// Immutable once appended. `timestamp` is local time at append (send time
/// for our own messages, receipt time for remote ones), in milliseconds
/// since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    pub sender: PeerId,
    pub timestamp: u64,
}

/// What actually goes on the wire: `{"type": ..., "data": ...}` as JSON text.
///
/// Sender and timestamp are not carried; the Transport supplies the sender
/// and the receiver stamps its own receipt time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// A chat line as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    pub sender: PeerId,
    pub sender_name: String,
    pub text: String,
    pub timestamp: u64,
}

impl Message {
    pub fn new(kind: impl Into<String>, payload: Value, sender: PeerId) -> Self {
        Self {
            kind: kind.into(),
            payload,
            sender,
            timestamp: now_ms(),
        }
    }

    pub fn from_wire(wire: WireMessage, sender: PeerId) -> Self {
        Self::new(wire.kind, wire.data, sender)
    }

    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            kind: self.kind.clone(),
            data: self.payload.clone(),
        }
    }

    pub fn is_chat(&self) -> bool {
        self.kind == CHAT_KIND
    }

    /// Chat text, if this is a chat message carrying `{"text": ...}`
    pub fn chat_text(&self) -> Option<&str> {
        if !self.is_chat() {
            return None;
        }
        self.payload.get("text").and_then(Value::as_str)
    }
}

/// Milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_message_is_stamped() {
        let msg = Message::new(CHAT_KIND, json!({ "text": "hi" }), PeerId::from("self"));
        assert!(msg.timestamp > 0);
        assert_eq!(msg.chat_text(), Some("hi"));
    }

    #[test]
    fn test_chat_text_only_for_chat() {
        let msg = Message::new("peer-name", json!({ "text": "hi" }), PeerId::from("self"));
        assert_eq!(msg.chat_text(), None);
    }

    #[test]
    fn test_wire_shape() {
        let msg = Message::new(CHAT_KIND, json!({ "text": "hi" }), PeerId::from("self"));
        let wire = serde_json::to_value(msg.to_wire()).unwrap();
        assert_eq!(wire, json!({ "type": "chat", "data": { "text": "hi" } }));
    }

    #[test]
    fn test_wire_data_defaults_to_null() {
        let wire: WireMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(wire.kind, "ping");
        assert_eq!(wire.data, Value::Null);
    }
}
