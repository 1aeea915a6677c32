//! Camp web API implementation of [`DataSource`].

use serde::Deserialize;
use url::Url;

use crate::time::{Clock, Sleeper, SystemClock, TokioSleeper};
use crate::transport::{
    HttpClient, HttpError, HttpRequest, RetryPolicy, directory_url, send_with_retry,
};

use super::{BattleRecord, DataSource, EntityId, FetchError, TokenCache};

/// Path of the battle list endpoint, relative to the API base URL.
pub const BATTLE_LIST_PATH: &str = "game/morebattlelist";

/// Header carrying the access token.
const TOKEN_HEADER: &str = "token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BattleListResponse {
    #[serde(default)]
    return_code: Option<i64>,
    #[serde(default)]
    return_msg: Option<String>,
    #[serde(default)]
    data: Option<BattleListData>,
}

#[derive(Debug, Deserialize)]
struct BattleListData {
    #[serde(default)]
    list: Option<Vec<BattleRecord>>,
}

impl BattleListResponse {
    /// Returns up to `count` records, newest first.
    ///
    /// An empty list is only an error when the API reported a non-zero code.
    fn into_recent(self, count: usize) -> Result<Vec<BattleRecord>, FetchError> {
        let records: Vec<BattleRecord> = self
            .data
            .and_then(|data| data.list)
            .unwrap_or_default()
            .into_iter()
            .take(count)
            .collect();

        match self.return_code {
            Some(code) if code != 0 && records.is_empty() => Err(FetchError::Api {
                code,
                message: self.return_msg.unwrap_or_default(),
            }),
            _ => Ok(records),
        }
    }
}

/// Fetches battle history from the camp web API.
///
/// Each fetch posts to [`BATTLE_LIST_PATH`] with the configured static
/// headers and, when the [`TokenCache`] yields one, a `token` header.
/// Transient failures are retried according to the [`RetryPolicy`].
///
/// # Type Parameters
///
/// - `H`: The HTTP client implementation
/// - `S`: The sleeper used between retries (defaults to [`TokioSleeper`])
/// - `C`: The clock used by the token cache (defaults to [`SystemClock`])
#[derive(Debug)]
pub struct CampApiSource<H, S = TokioSleeper, C = SystemClock> {
    client: H,
    sleeper: S,
    base_url: Url,
    headers: http::HeaderMap,
    retry_policy: RetryPolicy,
    tokens: TokenCache<C>,
}

impl<H> CampApiSource<H, TokioSleeper, SystemClock> {
    /// Creates a source with no extra headers, no token and the default retry policy.
    ///
    /// API paths are resolved below `base_url`, even without a trailing slash.
    #[must_use]
    pub fn new(client: H, base_url: Url) -> Self {
        Self {
            client,
            sleeper: TokioSleeper,
            base_url: directory_url(base_url),
            headers: http::HeaderMap::new(),
            retry_policy: RetryPolicy::default(),
            tokens: TokenCache::disabled(),
        }
    }
}

impl<H, S, C> CampApiSource<H, S, C> {
    /// Sets a custom sleeper for retry delays.
    #[must_use]
    pub fn with_sleeper<S2>(self, sleeper: S2) -> CampApiSource<H, S2, C> {
        CampApiSource {
            client: self.client,
            sleeper,
            base_url: self.base_url,
            headers: self.headers,
            retry_policy: self.retry_policy,
            tokens: self.tokens,
        }
    }

    /// Sets the token cache.
    #[must_use]
    pub fn with_tokens<C2>(self, tokens: TokenCache<C2>) -> CampApiSource<H, S, C2> {
        CampApiSource {
            client: self.client,
            sleeper: self.sleeper,
            base_url: self.base_url,
            headers: self.headers,
            retry_policy: self.retry_policy,
            tokens,
        }
    }

    /// Sets the static headers sent with every request.
    #[must_use]
    pub fn with_headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Returns the configured API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl<H: HttpClient, S: Sleeper, C: Clock> CampApiSource<H, S, C> {
    async fn build_request(&self, entity: &EntityId) -> Result<HttpRequest, FetchError> {
        let url = self
            .base_url
            .join(BATTLE_LIST_PATH)
            .map_err(|e| FetchError::Request(HttpError::InvalidUrl(e.to_string()).into()))?;

        let body = serde_json::json!({
            "lastTime": 0,
            "recommendPrivacy": 0,
            "apiVersion": 5,
            "friendUserId": entity.as_str(),
            "option": 0,
        });

        let mut request = HttpRequest::post(url)
            .with_json(&body)
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?
            .with_headers(&self.headers);

        match self.tokens.get(&self.client).await {
            Some(token) => match http::HeaderValue::from_str(&token) {
                Ok(value) => {
                    request.headers.insert(TOKEN_HEADER, value);
                }
                Err(_) => tracing::warn!("Access token is not a valid header value, skipping"),
            },
            None => tracing::debug!("No access token available, requesting without one"),
        }

        Ok(request)
    }

    /// Fetches up to `count` of the entity's most recent records, newest first.
    ///
    /// An entity without battles yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the list is currently unavailable.
    pub async fn fetch_recent(
        &self,
        entity: &EntityId,
        count: usize,
    ) -> Result<Vec<BattleRecord>, FetchError> {
        let request = self.build_request(entity).await?;
        let response =
            send_with_retry(&self.client, &self.sleeper, &self.retry_policy, &request).await?;

        let body: BattleListResponse = response
            .json()
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        body.into_recent(count)
    }
}

impl<H: HttpClient, S: Sleeper, C: Clock> DataSource for CampApiSource<H, S, C> {
    async fn fetch_latest(&self, entity: &EntityId) -> Result<Option<BattleRecord>, FetchError> {
        Ok(self.fetch_recent(entity, 1).await?.into_iter().next())
    }
}
