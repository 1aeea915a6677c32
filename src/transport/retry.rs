//! Exponential backoff for camp API reads.

use std::time::Duration;

use crate::time::Sleeper;

use super::{HttpClient, HttpError, HttpRequest, HttpResponse, RequestError};

/// How often and how patiently a request is repeated.
///
/// The default sends a request up to 3 times, waiting 1 s and then 2 s,
/// with no single wait longer than 8 s.
///
/// ```
/// use battle_push::transport::RetryPolicy;
/// use std::time::Duration;
///
/// let once = RetryPolicy {
///     max_attempts: 1,
///     ..RetryPolicy::default()
/// };
/// assert_eq!(once.initial_delay, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per request, the first one included. Values below 1 act as 1.
    pub max_attempts: u32,

    /// Wait before the second attempt.
    pub initial_delay: Duration,

    /// Cap on a single wait.
    pub max_delay: Duration,

    /// Growth factor of the wait per failed attempt.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Wait after the `failures`-th consecutive failure (1-based).
    pub(crate) fn backoff(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }
}

/// Returns true for failures that may clear up on their own: transport
/// errors other than a bad URL, 5xx, 429 and 408.
pub(crate) fn is_transient(error: &RequestError) -> bool {
    match error {
        RequestError::Http(HttpError::Connection(_) | HttpError::Timeout) => true,
        RequestError::Http(HttpError::InvalidUrl(_)) => false,
        RequestError::NonSuccessStatus { status, .. } => {
            status.is_server_error()
                || *status == http::StatusCode::TOO_MANY_REQUESTS
                || *status == http::StatusCode::REQUEST_TIMEOUT
        }
        RequestError::MaxRetriesExceeded { .. } => false,
    }
}

async fn attempt<H: HttpClient>(
    client: &H,
    request: &HttpRequest,
) -> Result<HttpResponse, RequestError> {
    let response = client.request(request.clone()).await?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(RequestError::NonSuccessStatus {
            status: response.status,
            body: response.body_text().map(ToString::to_string),
        })
    }
}

/// Sends `request`, repeating transient failures as `policy` allows.
///
/// Only 2xx responses count as success.
///
/// # Errors
///
/// Returns a permanent failure as-is, or
/// [`RequestError::MaxRetriesExceeded`] wrapping the last transient one.
pub async fn send_with_retry<H, S>(
    client: &H,
    sleeper: &S,
    policy: &RetryPolicy,
    request: &HttpRequest,
) -> Result<HttpResponse, RequestError>
where
    H: HttpClient,
    S: Sleeper,
{
    let mut failures = 0;
    loop {
        let error = match attempt(client, request).await {
            Ok(response) => return Ok(response),
            Err(e) if !is_transient(&e) => return Err(e),
            Err(e) => e,
        };
        failures += 1;

        if failures >= policy.max_attempts {
            return Err(RequestError::MaxRetriesExceeded {
                attempts: failures,
                last_error: Box::new(error),
            });
        }

        tracing::debug!("Attempt {failures} to {} failed ({error}), retrying", request.url);
        sleeper.sleep(policy.backoff(failures)).await;
    }
}
