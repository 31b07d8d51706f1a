//! Wire protocol for log-stream connections.

use dreamjob_core::{LogLine, UserIdentity};
use serde::{Deserialize, Serialize};

/// Message from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keepalive. Also marks the session as used.
    Ping,
}

/// Message from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Subscription established.
    Subscribed { identity: String },
    /// One live log line.
    Log { line: String },
    /// The session was removed; no more lines will follow.
    SessionClosed,
    /// Error message.
    Error { message: String },
    /// Pong response.
    Pong,
}

impl ServerMessage {
    /// Subscription confirmation for `identity`.
    #[must_use]
    pub fn subscribed(identity: &UserIdentity) -> Self {
        Self::Subscribed {
            identity: identity.to_string(),
        }
    }

    /// Wrap a log line.
    #[must_use]
    pub fn log(line: LogLine) -> Self {
        Self::Log {
            line: line.into_inner(),
        }
    }

    /// Error frame.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_serialization() {
        let msg = ServerMessage::log(LogLine::new("🔎 Searching for jobs..."));
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"log","line":"🔎 Searching for jobs..."}"#);
    }

    #[test]
    fn test_unit_variants_are_tagged() {
        let json = serde_json::to_string(&ServerMessage::SessionClosed).unwrap();
        assert_eq!(json, r#"{"type":"session_closed"}"#);

        let parsed: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::Ping);
    }

    #[test]
    fn test_unknown_client_message_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"resize"}"#).is_err());
    }
}
