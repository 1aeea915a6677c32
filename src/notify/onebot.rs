//! OneBot v11 HTTP API notifier.

use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::registry::{Destination, SubscriberId};
use crate::transport::{HttpClient, HttpError, HttpRequest, RequestError, directory_url};

use super::{DeliveryError, DeliveryReport, Notifier};

const PRIVATE_MESSAGE_ACTION: &str = "send_private_msg";
const GROUP_MESSAGE_ACTION: &str = "send_group_msg";

/// Response envelope of a OneBot action.
#[derive(Debug, Deserialize)]
struct ActionResponse {
    retcode: Option<i64>,
    #[serde(default)]
    wording: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Sends messages through a OneBot v11 compatible HTTP API.
///
/// Direct targets use `send_private_msg` with the subscriber as `user_id`;
/// group targets use `send_group_msg`. A target succeeds when the API answers
/// 2xx and, if the body carries a `retcode`, that code is 0.
///
/// Each target gets exactly one attempt.
///
/// # Example
///
/// ```
/// use battle_push::notify::OneBotNotifier;
/// use battle_push::transport::ReqwestClient;
/// use std::time::Duration;
/// use url::Url;
///
/// let notifier = OneBotNotifier::new(
///     ReqwestClient::with_timeout(Duration::from_secs(10)),
///     Url::parse("http://127.0.0.1:5700").unwrap(),
/// )
/// .with_access_token("secret");
/// ```
#[derive(Debug)]
pub struct OneBotNotifier<H> {
    client: H,
    base_url: Url,
    access_token: Option<String>,
}

impl<H> OneBotNotifier<H> {
    /// Creates a notifier for the API at `base_url`.
    #[must_use]
    pub fn new(client: H, base_url: Url) -> Self {
        Self {
            client,
            base_url: directory_url(base_url),
            access_token: None,
        }
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Returns the API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl<H: HttpClient> OneBotNotifier<H> {
    fn build_request(
        &self,
        subscriber: &SubscriberId,
        target: &Destination,
        payload: &str,
    ) -> Result<HttpRequest, DeliveryError> {
        let (action, body) = match target {
            Destination::Direct => (
                PRIVATE_MESSAGE_ACTION,
                json!({ "user_id": numeric_id(subscriber.as_str()), "message": payload }),
            ),
            Destination::Group(group) => (
                GROUP_MESSAGE_ACTION,
                json!({ "group_id": numeric_id(group), "message": payload }),
            ),
        };

        let url = self
            .base_url
            .join(action)
            .map_err(|e| RequestError::from(HttpError::InvalidUrl(e.to_string())))?;

        let mut request = HttpRequest::post(url)
            .with_json(&body)
            .map_err(DeliveryError::Encode)?;

        if let Some(token) = &self.access_token {
            match http::HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    request.headers.insert(http::header::AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Access token is not a valid header value, skipping"),
            }
        }

        Ok(request)
    }

    async fn send_one(
        &self,
        subscriber: &SubscriberId,
        target: &Destination,
        payload: &str,
    ) -> Result<(), DeliveryError> {
        let request = self.build_request(subscriber, target, payload)?;
        let response = self
            .client
            .request(request)
            .await
            .map_err(RequestError::from)?;

        if !response.is_success() {
            return Err(RequestError::NonSuccessStatus {
                status: response.status,
                body: response.body_text().map(ToString::to_string),
            }
            .into());
        }

        // Non-JSON bodies from a 2xx response count as accepted.
        let Ok(envelope) = response.json::<ActionResponse>() else {
            return Ok(());
        };
        match envelope.retcode {
            None | Some(0) => Ok(()),
            Some(retcode) => Err(DeliveryError::Rejected {
                retcode,
                message: envelope
                    .wording
                    .or(envelope.message)
                    .unwrap_or_default(),
            }),
        }
    }
}

impl<H: HttpClient> Notifier for OneBotNotifier<H> {
    async fn deliver(
        &self,
        subscriber: &SubscriberId,
        targets: &[Destination],
        payload: &str,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for target in targets {
            let result = self.send_one(subscriber, target, payload).await;
            match &result {
                Ok(()) => tracing::debug!(subscriber = %subscriber, target = %target, "Message sent"),
                Err(e) => tracing::debug!(subscriber = %subscriber, target = %target, "Message failed: {e}"),
            }
            report.push(target.clone(), result);
        }
        report
    }
}

/// OneBot implementations expect numeric ids; fall back to the raw string.
fn numeric_id(id: &str) -> Value {
    id.trim()
        .parse::<i64>()
        .map_or_else(|_| Value::String(id.to_string()), Value::from)
}
