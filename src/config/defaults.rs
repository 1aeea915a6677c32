//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

/// Default camp API base URL.
pub const API_URL: &str = "https://kohcamp.qq.com/";

/// Default polling interval in seconds.
pub const POLL_INTERVAL_SECS: u64 = 60;

/// Smallest accepted polling interval in seconds.
pub const MIN_POLL_INTERVAL_SECS: u64 = 5;

/// Default upper bound for one fetch (retries included) in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Default timeout of a single HTTP request in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default number of subscribers polled concurrently.
pub const MAX_CONCURRENCY: usize = 4;

/// Default maximum number of attempts per API request.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default initial retry delay in seconds.
pub const RETRY_INITIAL_DELAY_SECS: u64 = 1;

/// Default maximum retry delay in seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 8;

/// Default retry backoff multiplier.
pub const RETRY_MULTIPLIER: f64 = 2.0;

/// Directory name below the platform data directory.
pub const DATA_DIR_NAME: &str = "battle-push";

/// Headers the camp API expects from its mobile client.
pub const API_HEADERS: &[(&str, &str)] = &[
    ("cchannelid", "2002"),
    ("cclientversioncode", "2037905606"),
    ("cclientversionname", "8.101.1017"),
    ("ccurrentgameid", "20001"),
    ("cgameid", "20001"),
    ("cgzip", "1"),
    ("csystem", "android"),
    ("gameareaid", "1"),
    ("gameid", "20001"),
    ("noencrypt", "1"),
];

/// Default data directory: `<platform data dir>/battle-push`, or `./data`
/// when the platform has none.
#[must_use]
pub fn data_dir() -> std::path::PathBuf {
    dirs::data_dir().map_or_else(|| "data".into(), |dir| dir.join(DATA_DIR_NAME))
}
