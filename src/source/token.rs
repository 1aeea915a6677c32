//! Cached access token for the camp API.

use std::time::{Duration, SystemTime};

use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

use crate::time::{Clock, SystemClock};
use crate::transport::{HttpClient, HttpRequest};

/// How long a fetched token (or a failed fetch) is reused.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
}

#[derive(Debug)]
struct CachedToken {
    value: Option<String>,
    fetched_at: SystemTime,
}

/// Lazily fetched, time-limited access token.
///
/// The token endpoint must answer with a JSON object carrying a `token`
/// string. A failed fetch is cached for the same TTL so a broken endpoint is
/// not hammered once per subscriber; requests then go out without a token.
#[derive(Debug)]
pub struct TokenCache<C = SystemClock> {
    url: Option<Url>,
    ttl: Duration,
    clock: C,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache<SystemClock> {
    /// Creates a cache fetching from `url` with the default TTL.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self::with_clock(Some(url), SystemClock)
    }

    /// Creates a cache that never yields a token.
    #[must_use]
    pub fn disabled() -> Self {
        Self::with_clock(None, SystemClock)
    }
}

impl<C: Clock> TokenCache<C> {
    /// Creates a cache with a custom clock.
    #[must_use]
    pub fn with_clock(url: Option<Url>, clock: C) -> Self {
        Self {
            url,
            ttl: DEFAULT_TOKEN_TTL,
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Sets how long a token is reused.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the cached token, refreshing it when expired.
    ///
    /// Concurrent callers wait for a single refresh.
    pub async fn get<H: HttpClient>(&self, client: &H) -> Option<String> {
        let url = self.url.as_ref()?;
        let mut cached = self.cached.lock().await;
        let now = self.clock.now();

        if let Some(entry) = cached.as_ref() {
            let age = now.duration_since(entry.fetched_at).unwrap_or_default();
            if age < self.ttl {
                return entry.value.clone();
            }
        }

        let value = fetch_token(client, url).await;
        *cached = Some(CachedToken {
            value: value.clone(),
            fetched_at: now,
        });
        value
    }
}

async fn fetch_token<H: HttpClient>(client: &H, url: &Url) -> Option<String> {
    tracing::debug!("Refreshing access token from {url}");

    let response = match client.request(HttpRequest::get(url.clone())).await {
        Ok(response) if response.is_success() => response,
        Ok(response) => {
            tracing::warn!("Token endpoint returned {}", response.status);
            return None;
        }
        Err(e) => {
            tracing::warn!("Failed to fetch access token: {e}");
            return None;
        }
    };

    match response.json::<TokenResponse>() {
        Ok(body) if !body.token.is_empty() => Some(body.token),
        Ok(_) => {
            tracing::warn!("Token endpoint returned an empty token");
            None
        }
        Err(e) => {
            tracing::warn!("Token endpoint returned invalid JSON: {e}");
            None
        }
    }
}
