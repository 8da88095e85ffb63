//! Message Bus — the ordered, append-only log of sent and received messages.
//!
//! The log is totally ordered by append time at this peer. Peers may see the
//! same logical events interleaved differently; nothing here reconciles that.
//!
//! Subscribers either watch the whole log (a new prefix snapshot is
//! published on every append, without copying earlier entries) or receive each appended message on a broadcast stream and
//! filter on `kind`.

use super::codec::{decode_message, encode_message};
use super::log::{LogSnapshot, MessageLog};
use super::types::Message;
use crate::peer::PeerId;
use crate::transport::Room;
use crate::SessionError;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Capacity of the just-appended broadcast stream
const APPENDED_CAPACITY: usize = 256;

pub struct MessageBus {
    room: Arc<dyn Room>,
    channel: String,
    entries: MessageLog,
    log: watch::Sender<LogSnapshot>,
    appended: broadcast::Sender<Message>,
}

impl MessageBus {
    pub fn new(room: Arc<dyn Room>, channel: impl Into<String>) -> Self {
        let entries = MessageLog::new();
        let (log, _) = watch::channel(entries.snapshot());
        let (appended, _) = broadcast::channel(APPENDED_CAPACITY);
        Self {
            room,
            channel: channel.into(),
            entries,
            log,
            appended,
        }
    }

    /// Broadcast a message and record it locally.
    ///
    /// The local echo is appended after the outbound call returns, whether or
    /// not the Transport accepted it; a failed broadcast is reported as
    /// `SendFailure` but the echo stays in the log. Nothing is retried.
    pub async fn send(&self, kind: &str, data: Value) -> Result<Message, SessionError> {
        let message = Message::new(kind, data, self.room.self_id().clone());
        let text = encode_message(&message.to_wire())
            .map_err(|e| SessionError::InvalidInput(e.to_string()))?;

        let outcome = self.room.send(&self.channel, &text).await;
        self.append(message.clone());

        match outcome {
            Ok(()) => {
                debug!("Bus: sent {} ({} bytes)", message.kind, text.len());
                Ok(message)
            }
            Err(e) => {
                warn!("Bus: broadcast of {} failed, kept local echo: {}", message.kind, e);
                Err(SessionError::SendFailure(e.to_string()))
            }
        }
    }

    /// Decode an inbound payload and append it.
    ///
    /// A payload that does not decode is dropped and reported as
    /// `MalformedMessage`; the log is untouched and the bus stays usable.
    pub fn receive(&self, raw: &str, sender: PeerId) -> Result<Message, SessionError> {
        let wire = decode_message(raw).map_err(|e| {
            warn!("Bus: dropping payload from {}: {}", sender.short(), e);
            SessionError::MalformedMessage(e.to_string())
        })?;

        let message = Message::from_wire(wire, sender);
        debug!("Bus: received {} from {}", message.kind, message.sender.short());
        self.append(message.clone());
        Ok(message)
    }

    fn append(&self, message: Message) {
        self.log.send_replace(self.entries.append(message.clone()));
        // No subscribers is fine
        let _ = self.appended.send(message);
    }

    /// Snapshot of the full log
    pub fn log(&self) -> LogSnapshot {
        self.log.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Watch the whole log
    pub fn watch(&self) -> watch::Receiver<LogSnapshot> {
        self.log.subscribe()
    }

    /// Stream of messages as they are appended
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.appended.subscribe()
    }
}
