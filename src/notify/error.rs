//! Notification error types.

use thiserror::Error;

use crate::transport::RequestError;

/// Failure to deliver a message to one target.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The bot API could not be reached or answered with a non-2xx status.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The bot API accepted the request but reported a failure.
    #[error("Bot API rejected message (retcode {retcode}): {message}")]
    Rejected {
        /// Non-zero `retcode` from the response.
        retcode: i64,
        /// `wording`/`message` from the response, if any.
        message: String,
    },

    /// The request body could not be built.
    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure to compile or render a message template.
#[derive(Debug, Error)]
#[error("Message template error: {0}")]
pub struct TemplateError(pub String);
