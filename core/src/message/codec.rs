// Message codec — JSON text on the wire, with a size limit to prevent abuse

use super::types::WireMessage;
use thiserror::Error;

/// Maximum encoded message size: 64 KB
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Message too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Malformed message: {0}")]
    Malformed(String),
}

/// Serialize a wire message to JSON text
pub fn encode_message(msg: &WireMessage) -> Result<String, CodecError> {
    let text = serde_json::to_string(msg).map_err(|e| CodecError::Malformed(e.to_string()))?;

    if text.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::TooLarge {
            size: text.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    Ok(text)
}

/// Parse JSON text into a wire message
pub fn decode_message(text: &str) -> Result<WireMessage, CodecError> {
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::TooLarge {
            size: text.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    serde_json::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))
}
