// Message module — types, wire codec, and the ordered message bus

pub mod bus;
pub mod codec;
pub mod log;
pub mod types;

pub use bus::MessageBus;
pub use codec::{decode_message, encode_message, CodecError, MAX_MESSAGE_SIZE};
pub use log::{LogSnapshot, MessageLog};
pub use types::{now_ms, ChatLine, Message, WireMessage, CHAT_KIND};
