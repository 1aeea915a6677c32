//! Error types for HTTP operations.

use thiserror::Error;

/// Error type for HTTP operations.
///
/// Describes what went wrong without dictating recovery strategy.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network connection failed.
    ///
    /// This includes DNS resolution failures, connection refused,
    /// and other network-level errors.
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The provided URL is invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Error from a single request attempt, including non-2xx responses.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The transport failed before a response was received.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The server answered with a non-success status.
    #[error("Non-success status {status}: {}", .body.as_deref().unwrap_or("<non-UTF-8 body>"))]
    NonSuccessStatus {
        /// The status code returned.
        status: http::StatusCode,
        /// The response body, if it was valid UTF-8.
        body: Option<String>,
    },

    /// Every allowed attempt failed.
    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        last_error: Box<RequestError>,
    },
}
