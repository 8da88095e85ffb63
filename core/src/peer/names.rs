// Name announcement — `peer-name` control messages carried on the message bus

use crate::message::Message;
use serde_json::{json, Value};

/// Message type of a name announcement (never rendered as chat)
pub const PEER_NAME_KIND: &str = "peer-name";

/// Payload announcing the local display name
pub fn announcement(name: &str) -> Value {
    json!({ "name": name })
}

/// Extract the announced name from a `peer-name` message.
///
/// Returns `None` for other message types or a payload without a string name.
pub fn parse_announcement(message: &Message) -> Option<&str> {
    if message.kind != PEER_NAME_KIND {
        return None;
    }
    message.payload.get("name").and_then(Value::as_str)
}
