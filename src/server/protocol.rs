//! Subscriber wire protocol
//!
//! JSON frames of the shape `{"event": "...", "data": {...}}` in both
//! directions. Normalized events go out as `game_event` frames except chat,
//! which keeps its own `chat` frame for compatibility with existing game
//! clients.

use serde::{Deserialize, Serialize};

use crate::event::{EventKind, NormalizedEvent};
use crate::registry::ChannelUpdate;

/// A frame sent by a subscriber
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request membership for a channel
    #[serde(rename_all = "camelCase")]
    SetChannel {
        channel_id: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

/// A frame sent to a subscriber
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Admission denied; the connection closes shortly after
    AuthError { msg: String },
    /// The upstream connect attempt for the joined channel failed
    ConnectError { msg: String },
    /// A chat message on the joined channel
    Chat { user: String, msg: String },
    /// Any other normalized event on the joined channel
    GameEvent(NormalizedEvent),
}

impl ServerMessage {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        ServerMessage::AuthError { msg: msg.into() }
    }

    /// Map a fan-out update to its outbound frame
    pub fn from_update(update: ChannelUpdate) -> Self {
        match update {
            ChannelUpdate::Event(event) => match event.kind {
                EventKind::Chat { message } => ServerMessage::Chat {
                    user: event.user,
                    msg: message,
                },
                _ => ServerMessage::GameEvent(event),
            },
            ChannelUpdate::ConnectFailed(reason) => ServerMessage::ConnectError { msg: reason },
        }
    }

    /// Serialize to a JSON wire frame
    pub fn to_json(&self) -> String {
        // The frame enum has no serialization failure modes
        serde_json::to_string(self).expect("server message serializes")
    }
}

/// Parse one inbound text frame
pub fn parse_client_message(text: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(text)
}
