//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Camp API configuration section
    #[serde(default)]
    pub source: SourceSection,

    /// Bot API configuration section
    #[serde(default)]
    pub notifier: NotifierSection,

    /// Polling configuration section
    #[serde(default)]
    pub poller: PollerSection,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetrySection,

    /// Persistence configuration
    #[serde(default)]
    pub storage: StorageSection,
}

/// Camp API configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    /// API base URL
    pub base_url: Option<String>,

    /// Token endpoint answering `{"token": "..."}`
    pub token_url: Option<String>,

    /// Extra request headers (override the built-in client headers)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Timeout of a single HTTP request in seconds
    pub request_timeout: Option<u64>,
}

/// Bot API configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifierSection {
    /// OneBot HTTP API base URL
    pub url: Option<String>,

    /// Access token sent as a Bearer token
    pub access_token: Option<String>,

    /// Handlebars push message template
    pub message_template: Option<String>,
}

/// Polling configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollerSection {
    /// Polling interval in seconds
    pub poll_interval: Option<u64>,

    /// Upper bound for one fetch in seconds
    pub fetch_timeout: Option<u64>,

    /// Subscribers polled concurrently
    pub max_concurrency: Option<usize>,
}

/// Retry policy configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// Maximum number of attempts
    pub max_attempts: Option<u32>,

    /// Initial retry delay in seconds
    pub initial_delay: Option<u64>,

    /// Maximum retry delay in seconds
    pub max_delay: Option<u64>,

    /// Backoff multiplier
    pub multiplier: Option<f64>,
}

/// Persistence configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// Directory holding the state files (`~` is expanded)
    pub data_dir: Option<PathBuf>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# battle-push configuration file

[source]
# Camp API base URL (default: https://kohcamp.qq.com/)
# base_url = "https://kohcamp.qq.com/"

# Token endpoint answering {"token": "..."}; tokens are cached for 5 minutes.
# Requests are sent without a token when unset or unavailable.
# token_url = "https://api.t1qq.com/api/tool/wzrr/wztoken"

# Timeout of a single HTTP request in seconds (default: 10)
# request_timeout = 10

# Extra request headers, overriding the built-in client headers
# [source.headers]
# cclientversionname = "8.101.1017"

[notifier]
# OneBot v11 HTTP API base URL. Without it, push messages are only logged.
# url = "http://127.0.0.1:5700"

# Access token sent as "Authorization: Bearer <token>"
# access_token = "your-token-here"

# Handlebars push message template
# Available variables: {{entity}}, {{result}}, {{win}}, {{hero}}, {{map}},
# {{kills}}, {{deaths}}, {{assists}}, {{kda}}, {{score}}, {{time}}
# message_template = "{{hero}} {{kda}} {{result}}"

[poller]
# Polling interval in seconds (default: 60, minimum: 5)
poll_interval = 60

# Upper bound for one fetch including retries, in seconds (default: 30)
# fetch_timeout = 30

# Subscribers polled concurrently (default: 4)
# max_concurrency = 4

[retry]
# Maximum number of attempts per API request (default: 3)
# max_attempts = 3

# Initial retry delay in seconds (default: 1)
# initial_delay = 1

# Maximum retry delay in seconds (default: 8)
# max_delay = 8

# Backoff multiplier (default: 2.0)
# multiplier = 2.0

[storage]
# Directory for subscriptions.json, markers.json and accounts.json
# (default: the platform data directory + /battle-push)
# data_dir = "~/.local/share/battle-push"
"#
    .to_string()
}
