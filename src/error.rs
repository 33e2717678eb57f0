//! # Error Handling
//!
//! Two error surfaces live here:
//!
//! - `BridgeError`: everything that can go wrong inside a voice session
//!   (model loading, recognizer construction, protocol decoding, per-frame
//!   processing). These never become HTTP responses; they are reported to the
//!   client as `error` envelopes over the WebSocket.
//! - `AppError`: failures on the plain HTTP surface (config endpoints),
//!   converted to JSON responses via actix's `ResponseError` trait.
//!
//! ## Propagation policy:
//! `ModelLoad` and `RecognizerInit` are fatal for the session that hit them:
//! the client gets one `error` envelope and the connection is closed. All
//! other bridge errors keep the connection open; a malformed control message
//! or a failed audio chunk must not terminate an otherwise healthy session.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Errors raised by the speech session bridge.
#[derive(Debug)]
pub enum BridgeError {
    /// The recognition model could not be loaded from disk
    ModelLoad(String),

    /// A per-session recognizer could not be constructed
    RecognizerInit(String),

    /// A control frame was malformed or carried an unknown type
    Protocol(String),

    /// A decoder call failed while handling a frame
    Processing(String),
}

impl BridgeError {
    /// Fatal errors terminate the session; everything else is recoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::ModelLoad(_) | BridgeError::RecognizerInit(_))
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::ModelLoad(msg) => write!(f, "model load error: {}", msg),
            BridgeError::RecognizerInit(msg) => write!(f, "recognizer init error: {}", msg),
            BridgeError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            BridgeError::Processing(msg) => write!(f, "processing error: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Errors returned by the HTTP endpoints (health, metrics, config).
#[derive(Debug)]
pub enum AppError {
    /// Server-side failures
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Input failed validation rules
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BridgeError::ModelLoad("missing".to_string()).is_fatal());
        assert!(BridgeError::RecognizerInit("bad rate".to_string()).is_fatal());
        assert!(!BridgeError::Protocol("unknown type".to_string()).is_fatal());
        assert!(!BridgeError::Processing("decode failed".to_string()).is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = BridgeError::ModelLoad("no such path".to_string());
        assert_eq!(err.to_string(), "model load error: no such path");

        let err = BridgeError::Processing("chunk rejected".to_string());
        assert!(err.to_string().contains("chunk rejected"));
    }
}
