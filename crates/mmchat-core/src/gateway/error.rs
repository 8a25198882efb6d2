//! Gateway error taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of gateway errors so callers can branch deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    /// Missing credential or unusable client settings
    Configuration,
    /// Connection failure, timeout, or other network error
    Transport,
    /// Non-success HTTP status
    HttpStatus,
    /// Response could not be understood
    Parse,
    /// Request body could not be encoded
    Encoding,
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayErrorKind::Configuration => write!(f, "configuration"),
            GatewayErrorKind::Transport => write!(f, "transport"),
            GatewayErrorKind::HttpStatus => write!(f, "http_status"),
            GatewayErrorKind::Parse => write!(f, "parse"),
            GatewayErrorKind::Encoding => write!(f, "encoding"),
        }
    }
}

/// Structured error from the model transport.
///
/// `Display` prints only the message; the kind is for branching and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Configuration, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Transport, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Parse, message)
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Encoding, message)
    }

    /// Creates an HTTP status error, lifting `error.message` out of JSON bodies.
    pub fn http_status(status: u16, body: &str) -> Self {
        if body.is_empty() {
            return Self::new(GatewayErrorKind::HttpStatus, format!("HTTP {status}"));
        }

        if let Ok(json) = serde_json::from_str::<Value>(body)
            && let Some(msg) = json
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
        {
            return Self {
                kind: GatewayErrorKind::HttpStatus,
                message: format!("HTTP {status}: {msg}"),
                details: Some(body.to_string()),
            };
        }

        Self {
            kind: GatewayErrorKind::HttpStatus,
            message: format!("HTTP {status}"),
            details: Some(body.to_string()),
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GatewayError {}

/// Classifies a reqwest error into a `GatewayError`.
pub fn classify_reqwest_error(e: &reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::transport(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        GatewayError::transport(format!("Connection failed: {e}"))
    } else if e.is_builder() {
        GatewayError::configuration(format!("Invalid request: {e}"))
    } else if e.is_decode() {
        GatewayError::parse(format!("Failed to read response: {e}"))
    } else {
        GatewayError::transport(format!("Network error: {e}"))
    }
}
