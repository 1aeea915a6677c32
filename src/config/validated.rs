//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use url::Url;

use crate::monitor::PollerConfig;
use crate::notify::MessageTemplate;
use crate::transport::RetryPolicy;

use super::cli::Cli;
use super::defaults;
use super::error::ConfigError;
use super::toml::TomlConfig;

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
#[derive(Debug)]
pub struct ValidatedConfig {
    /// Camp API base URL
    pub api_url: Url,

    /// Token endpoint; `None` disables tokens
    pub token_url: Option<Url>,

    /// Headers sent with every camp API request
    pub api_headers: HeaderMap,

    /// Timeout of a single HTTP request
    pub request_timeout: Duration,

    /// Retry policy for camp API requests
    pub retry_policy: RetryPolicy,

    /// OneBot HTTP API base URL; `None` means log-only delivery
    pub notify_url: Option<Url>,

    /// Access token for the OneBot HTTP API
    pub access_token: Option<String>,

    /// Compiled push message template
    pub message_template: MessageTemplate,

    /// Polling interval
    pub poll_interval: Duration,

    /// Fetch timeout and concurrency of the poller
    pub poller: PollerConfig,

    /// Directory holding the state files
    pub data_dir: PathBuf,

    /// Dry-run mode (log push messages without sending them)
    pub dry_run: bool,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let notify = self
            .notify_url
            .as_ref()
            .map_or_else(|| "log".to_string(), ToString::to_string);

        write!(
            f,
            "Config {{ api: {}, token: {}, notify: {}, poll_interval: {}s, fetch_timeout: {}s, \
             concurrency: {}, retry: {}x/{}s, data_dir: {}, dry_run: {} }}",
            self.api_url,
            if self.token_url.is_some() { "on" } else { "off" },
            notify,
            self.poll_interval.as_secs(),
            self.poller.fetch_timeout.as_secs(),
            self.poller.max_concurrency,
            self.retry_policy.max_attempts,
            self.retry_policy.initial_delay.as_secs(),
            self.data_dir.display(),
            self.dry_run,
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A URL is invalid
    /// - The poll interval is below the minimum, or another duration is zero
    /// - Header format is invalid
    /// - The message template does not compile
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let api_url = Self::resolve_api_url(cli, toml)?;
        let token_url = Self::resolve_token_url(cli, toml)?;
        let api_headers = Self::resolve_headers(cli, toml)?;
        let request_timeout = Self::resolve_request_timeout(toml)?;
        let retry_policy = Self::build_retry_policy(cli, toml)?;

        let notify_url = cli
            .notify_url
            .as_deref()
            .or_else(|| toml.and_then(|t| t.notifier.url.as_deref()))
            .map(parse_url)
            .transpose()?;
        let access_token = cli
            .access_token
            .clone()
            .or_else(|| toml.and_then(|t| t.notifier.access_token.clone()));
        let message_template = Self::resolve_message_template(toml)?;

        let poll_interval = Self::resolve_poll_interval(cli, toml)?;
        let poller = Self::build_poller_config(cli, toml)?;
        let data_dir = Self::resolve_data_dir(cli, toml);

        Ok(Self {
            api_url,
            token_url,
            api_headers,
            request_timeout,
            retry_policy,
            notify_url,
            access_token,
            message_template,
            poll_interval,
            poller,
            data_dir,
            dry_run: cli.dry_run,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(path)?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    fn resolve_api_url(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Url, ConfigError> {
        // Priority: CLI explicit > TOML > default
        let url = cli
            .api_url
            .as_deref()
            .or_else(|| toml.and_then(|t| t.source.base_url.as_deref()))
            .unwrap_or(defaults::API_URL);
        parse_url(url)
    }

    fn resolve_token_url(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Option<Url>, ConfigError> {
        cli.token_url
            .as_deref()
            .or_else(|| toml.and_then(|t| t.source.token_url.as_deref()))
            .map(parse_url)
            .transpose()
    }

    fn resolve_headers(cli: &Cli, toml: Option<&TomlConfig>) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();

        // Built-in client headers first (TOML and CLI can override)
        for (name, value) in defaults::API_HEADERS {
            headers.insert(parse_header_name(name)?, parse_header_value(name, value)?);
        }

        if let Some(toml) = toml {
            for (name, value) in &toml.source.headers {
                headers.insert(parse_header_name(name)?, parse_header_value(name, value)?);
            }
        }

        for header_str in &cli.headers {
            let (name, value) = parse_header_string(header_str)?;
            headers.insert(parse_header_name(&name)?, parse_header_value(&name, &value)?);
        }

        Ok(headers)
    }

    fn resolve_request_timeout(toml: Option<&TomlConfig>) -> Result<Duration, ConfigError> {
        let seconds = toml
            .and_then(|t| t.source.request_timeout)
            .unwrap_or(defaults::REQUEST_TIMEOUT_SECS);
        positive_seconds("request_timeout", seconds)
    }

    fn resolve_message_template(toml: Option<&TomlConfig>) -> Result<MessageTemplate, ConfigError> {
        match toml.and_then(|t| t.notifier.message_template.as_deref()) {
            Some(source) => {
                MessageTemplate::new(source).map_err(|e| ConfigError::InvalidTemplate {
                    reason: e.to_string(),
                })
            }
            None => Ok(MessageTemplate::default()),
        }
    }

    fn resolve_poll_interval(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Duration, ConfigError> {
        // Priority: CLI explicit > TOML > default
        let seconds = cli
            .poll_interval
            .or_else(|| toml.and_then(|t| t.poller.poll_interval))
            .unwrap_or(defaults::POLL_INTERVAL_SECS);

        if seconds < defaults::MIN_POLL_INTERVAL_SECS {
            return Err(ConfigError::InvalidDuration {
                field: "poll_interval",
                reason: format!(
                    "must be at least {}s, got {seconds}s",
                    defaults::MIN_POLL_INTERVAL_SECS
                ),
            });
        }

        Ok(Duration::from_secs(seconds))
    }

    fn build_poller_config(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<PollerConfig, ConfigError> {
        let poller = toml.map(|t| &t.poller);

        let fetch_timeout_secs = cli
            .fetch_timeout
            .or_else(|| poller.and_then(|p| p.fetch_timeout))
            .unwrap_or(defaults::FETCH_TIMEOUT_SECS);
        let fetch_timeout = positive_seconds("fetch_timeout", fetch_timeout_secs)?;

        let max_concurrency = cli
            .max_concurrency
            .or_else(|| poller.and_then(|p| p.max_concurrency))
            .unwrap_or(defaults::MAX_CONCURRENCY);
        if max_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        Ok(PollerConfig::default()
            .with_fetch_timeout(fetch_timeout)
            .with_max_concurrency(max_concurrency))
    }

    fn build_retry_policy(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<RetryPolicy, ConfigError> {
        let retry = toml.map(|t| &t.retry);

        // Priority: CLI explicit > TOML > default
        let max_attempts = cli
            .retry_max
            .or_else(|| retry.and_then(|r| r.max_attempts))
            .unwrap_or(defaults::RETRY_MAX_ATTEMPTS);

        let initial_delay_secs = cli
            .retry_delay
            .or_else(|| retry.and_then(|r| r.initial_delay))
            .unwrap_or(defaults::RETRY_INITIAL_DELAY_SECS);

        let max_delay_secs = retry
            .and_then(|r| r.max_delay)
            .unwrap_or(defaults::RETRY_MAX_DELAY_SECS)
            .max(initial_delay_secs);

        let multiplier = retry
            .and_then(|r| r.multiplier)
            .unwrap_or(defaults::RETRY_MULTIPLIER);

        if max_attempts == 0 {
            return Err(ConfigError::InvalidRetry(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if initial_delay_secs == 0 {
            return Err(ConfigError::InvalidRetry(
                "initial_delay must be greater than 0".to_string(),
            ));
        }

        if multiplier <= 0.0 || !multiplier.is_finite() {
            return Err(ConfigError::InvalidRetry(
                "multiplier must be a positive finite number".to_string(),
            ));
        }

        if let Some(max_delay) = retry.and_then(|r| r.max_delay) {
            if max_delay < initial_delay_secs {
                return Err(ConfigError::InvalidRetry(format!(
                    "max_delay ({max_delay}s) must be >= initial_delay ({initial_delay_secs}s)"
                )));
            }
        }

        Ok(RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_secs(initial_delay_secs),
            max_delay: Duration::from_secs(max_delay_secs),
            multiplier,
        })
    }

    fn resolve_data_dir(cli: &Cli, toml: Option<&TomlConfig>) -> PathBuf {
        cli.data_dir
            .as_deref()
            .or_else(|| toml.and_then(|t| t.storage.data_dir.as_deref()))
            .map_or_else(defaults::data_dir, expand_tilde)
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

// Helper functions

fn parse_url(url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn positive_seconds(field: &'static str, seconds: u64) -> Result<Duration, ConfigError> {
    if seconds == 0 {
        return Err(ConfigError::InvalidDuration {
            field,
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(Duration::from_secs(seconds))
}

/// Expands a leading `~` to the home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest))
}

fn parse_header_string(s: &str) -> Result<(String, String), ConfigError> {
    // Try "Key=Value" format first
    if let Some((name, value)) = s.split_once('=') {
        return Ok((name.trim().to_string(), value.trim().to_string()));
    }

    // Try "Key: Value" format
    if let Some((name, value)) = s.split_once(':') {
        return Ok((name.trim().to_string(), value.trim().to_string()));
    }

    Err(ConfigError::InvalidHeader {
        value: s.to_string(),
    })
}

fn parse_header_name(name: &str) -> Result<HeaderName, ConfigError> {
    name.parse::<HeaderName>()
        .map_err(|e| ConfigError::InvalidHeaderName {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeaderValue {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
