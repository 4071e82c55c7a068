//! Error types for the FizikHub gate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;
use tracing::error;

/// Main error type for gate operations.
///
/// Rate limit rejections are deliberately not represented here: over-budget
/// is an expected outcome surfaced as a `429` by the gate itself, not a
/// server error.
#[derive(Error, Debug)]
pub enum GateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors reaching or reading from the upstream application
    #[error("Upstream error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Errors buffering a request body before forwarding
    #[error("Body error: {0}")]
    Body(#[from] axum::Error),

    /// Errors assembling an HTTP response
    #[error("HTTP error: {0}")]
    Http(#[from] axum::http::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;

impl IntoResponse for GateError {
    /// Map failures that escape a request handler onto a response.
    ///
    /// Upstream failures become a `502` so the caller can distinguish "the
    /// gate refused you" (`429`) from "the application is unreachable".
    fn into_response(self) -> Response {
        let status = match self {
            GateError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        error!(error = %self, status = %status, "Request failed");

        let body = Json(serde_json::json!({
            "error": "Sunucuya şu anda ulaşılamıyor. Lütfen daha sonra tekrar deneyin."
        }));

        (status, body).into_response()
    }
}
