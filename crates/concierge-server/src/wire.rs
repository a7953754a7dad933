//! Inbound frame codec. Frames are `{"event": "...", "data": {...}}`,
//! the same envelope [`SessionEvent`] uses outbound.
//!
//! [`SessionEvent`]: concierge_core::events::SessionEvent

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    UserMessage { text: String },
    Ping,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct UserMessageData {
    #[serde(alias = "message")]
    text: String,
}

pub fn parse_frame(raw: &str) -> Result<Inbound, FrameError> {
    let envelope: Envelope = serde_json::from_str(raw)?;
    match envelope.event.as_str() {
        "user_message" => {
            let data: UserMessageData = serde_json::from_value(envelope.data)?;
            Ok(Inbound::UserMessage { text: data.text })
        }
        "ping" => Ok(Inbound::Ping),
        other => Err(FrameError::UnknownEvent(other.to_string())),
    }
}
