//! Realtime frame decoding.
//!
//! The server pushes JSON text frames of the form
//! `{"target": "...", "action": "create" | "edit" | "delete", "result": [...]}`.
//! The client never sends application frames, only pongs and the closing
//! handshake.

use stockroom_engine::ChangeNotification;
use tokio_tungstenite::tungstenite::Message;

/// What the reader should do with one transport message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A change notification to publish.
    Change(ChangeNotification),
    /// A ping to answer with the same payload.
    Ping(Vec<u8>),
    /// The server closed the connection.
    Close,
    /// Nothing to do. Carries the reason for logging.
    Skip(String),
}

/// Classify one transport message.
pub fn decode(message: Message) -> Inbound {
    match message {
        Message::Text(text) => decode_text(&text),
        Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
            Ok(text) => decode_text(text),
            Err(_) => Inbound::Skip("binary frame is not UTF-8".to_string()),
        },
        Message::Ping(payload) => Inbound::Ping(payload),
        Message::Pong(_) => Inbound::Skip("pong".to_string()),
        Message::Close(_) => Inbound::Close,
        Message::Frame(_) => Inbound::Skip("raw frame".to_string()),
    }
}

fn decode_text(text: &str) -> Inbound {
    match ChangeNotification::parse(text) {
        Ok(notification) => Inbound::Change(notification),
        Err(e) => Inbound::Skip(e.to_string()),
    }
}
