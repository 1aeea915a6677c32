//! HTTP transport shared by the camp API source and the bot notifier.
//!
//! This module provides:
//! - Request/response value types ([`HttpRequest`], [`HttpResponse`])
//! - The client abstraction ([`HttpClient`]) and its reqwest implementation ([`ReqwestClient`])
//! - Exponential backoff ([`RetryPolicy`]) and a retrying executor ([`send_with_retry`])

mod client;
mod error;
mod request;
mod retry;

#[cfg(test)]
pub mod mock;


pub use client::ReqwestClient;
pub use error::{HttpError, RequestError};
pub use request::{HttpClient, HttpRequest, HttpResponse, directory_url};
pub use retry::{RetryPolicy, send_with_retry};
