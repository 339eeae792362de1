//! Error type shared by the game-server client, the gateway and the relay.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error category for client-side failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientErrorKind {
    /// No active player identity (command sent before joining)
    NotConnected,
    /// Network or broker unreachable, connection dropped, request timed out
    TransportFailure,
    /// Unexpected response shape or non-success status from the game server
    ProtocolFailure,
    /// Bus subscribe/unsubscribe error
    SubscriptionFailure,
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErrorKind::NotConnected => write!(f, "not_connected"),
            ClientErrorKind::TransportFailure => write!(f, "transport_failure"),
            ClientErrorKind::ProtocolFailure => write!(f, "protocol_failure"),
            ClientErrorKind::SubscriptionFailure => write!(f, "subscription_failure"),
        }
    }
}

/// Structured client error with kind and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientError {
    /// Error category
    pub kind: ClientErrorKind,
    /// One-line summary suitable for the transcript
    pub message: String,
    /// Optional additional details (e.g., raw response body)
    pub details: Option<String>,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn not_connected() -> Self {
        Self::new(ClientErrorKind::NotConnected, "Not connected to game")
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::TransportFailure, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::ProtocolFailure, message)
    }

    pub fn subscription(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::SubscriptionFailure, message)
    }

    /// Creates a protocol error from a non-success HTTP response.
    ///
    /// The message is the most readable thing the body offers: an `error`
    /// string, an `error.message` field, a top-level `message`, and finally the
    /// raw body text.
    pub fn http_status(status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        let message = match readable_error_message(trimmed) {
            Some(msg) => msg,
            None if trimmed.is_empty() => format!("HTTP {status}"),
            None => trimmed.to_string(),
        };
        Self {
            kind: ClientErrorKind::ProtocolFailure,
            message,
            details: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        }
    }

    pub fn is_not_connected(&self) -> bool {
        self.kind == ClientErrorKind::NotConnected
    }
}

/// Extracts a structured error message from a JSON body, if present.
pub(crate) fn readable_error_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    let from_error = match json.get("error") {
        Some(Value::String(msg)) => Some(msg.clone()),
        Some(obj @ Value::Object(_)) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };
    from_error
        .or_else(|| {
            json.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|msg| !msg.trim().is_empty())
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::transport(format!("Request timed out: {err}"))
        } else if err.is_decode() {
            ClientError::protocol(format!("Unexpected response from game server: {err}"))
        } else {
            ClientError::transport(format!("Unable to reach game server: {err}"))
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
