use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Outbound events for one session, serialized as `{"event": ..., "data": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    BotMessage {
        text: String,
    },
    BotTyping {
        active: bool,
    },
    /// `tool: None` clears the activity indicator.
    ToolUsed {
        tool: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<serde_json::Value>,
    },
    ConnectionStatus {
        status: String,
        #[serde(
            rename = "sessionId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        session_id: Option<SessionId>,
    },
    Pong {
        timestamp: String,
    },
}

impl SessionEvent {
    pub fn bot_message(text: impl Into<String>) -> Self {
        Self::BotMessage { text: text.into() }
    }

    pub fn tool_started(tool: &str, input: serde_json::Value) -> Self {
        Self::ToolUsed {
            tool: Some(tool.to_string()),
            input: Some(input),
        }
    }

    pub fn tool_cleared() -> Self {
        Self::ToolUsed {
            tool: None,
            input: None,
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Self::ConnectionStatus {
            status: status.into(),
            session_id: None,
        }
    }

    /// Wire name of the event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::BotMessage { .. } => "bot_message",
            Self::BotTyping { .. } => "bot_typing",
            Self::ToolUsed { .. } => "tool_used",
            Self::ConnectionStatus { .. } => "connection_status",
            Self::Pong { .. } => "pong",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_shape() {
        let json = serde_json::to_value(SessionEvent::bot_message("hola")).unwrap();
        assert_eq!(json, json!({"event": "bot_message", "data": {"text": "hola"}}));
    }

    #[test]
    fn cleared_tool_serializes_null() {
        let json = serde_json::to_value(SessionEvent::tool_cleared()).unwrap();
        assert_eq!(json, json!({"event": "tool_used", "data": {"tool": null}}));
    }

    #[test]
    fn connection_status_carries_session_id() {
        let id = SessionId::from_raw("sess_1");
        let event = SessionEvent::ConnectionStatus {
            status: "connected".into(),
            session_id: Some(id),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data"]["sessionId"], "sess_1");
        assert_eq!(event.event_name(), "connection_status");
    }

    #[test]
    fn typing_event_name_matches_tag() {
        let event = SessionEvent::BotTyping { active: true };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.event_name());
        assert_eq!(json["data"]["active"], true);
    }
}
