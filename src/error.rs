//! Error types for the Savant relay
//!
//! One taxonomy shared by the request handlers and the background feeds.
//! Handler-facing variants map onto HTTP statuses; feed-local variants
//! (connection, parsing, watch) are logged by their owning loop and never
//! reach a request.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Error types for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// Service directory store unreachable or query failed
    #[error("Service directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// No usable control endpoint for command sends
    #[error("Control endpoint unresolved: {0}")]
    EndpointUnresolved(String),

    /// Datagram hand-off to the network stack failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed or incomplete request body
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Lighting controller connection or handshake failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Status file or protocol line could not be parsed
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// File watch could not be established or was lost
    #[error("Watch error: {0}")]
    Watch(String),

    /// mDNS lookup failure (always recoverable via the fallback port)
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl RelayError {
    /// Create a directory-unavailable error
    pub fn directory_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::DirectoryUnavailable(msg.into())
    }

    /// Create an endpoint-unresolved error
    pub fn endpoint_unresolved<S: Into<String>>(msg: S) -> Self {
        Self::EndpointUnresolved(msg.into())
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a bad-request error
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create a connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a parsing error
    pub fn parsing<S: Into<String>>(msg: S) -> Self {
        Self::Parsing(msg.into())
    }

    /// Create a watch error
    pub fn watch<S: Into<String>>(msg: S) -> Self {
        Self::Watch(msg.into())
    }

    /// Create a discovery error
    pub fn discovery<S: Into<String>>(msg: S) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayError::Connection(_) | RelayError::Transport(_) | RelayError::Io(_)
        )
    }

    /// HTTP status for handler-facing errors
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::DirectoryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::EndpointUnresolved(_) | RelayError::Transport(_) => StatusCode::BAD_GATEWAY,
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<notify::Error> for RelayError {
    fn from(err: notify::Error) -> Self {
        RelayError::Watch(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        }));
        (status, body).into_response()
    }
}
