//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// battle-push: battle record notifications
///
/// Polls the camp API for new battle records of subscribed accounts and
/// pushes them to chat users and groups.
#[derive(Debug, Parser)]
#[command(name = "battle-push")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run (default: run)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding subscriptions, markers and accounts
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Polling interval in seconds (minimum 5)
    #[arg(long = "poll-interval", global = true)]
    pub poll_interval: Option<u64>,

    /// Upper bound for one fetch in seconds
    #[arg(long = "fetch-timeout", global = true)]
    pub fetch_timeout: Option<u64>,

    /// Subscribers polled concurrently
    #[arg(long = "max-concurrency", global = true)]
    pub max_concurrency: Option<usize>,

    /// Camp API base URL
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,

    /// Token endpoint URL
    #[arg(long = "token-url", global = true)]
    pub token_url: Option<String>,

    /// Extra API headers in 'Key=Value' or 'Key: Value' format (can be specified multiple times)
    #[arg(long = "header", value_name = "K=V", global = true)]
    pub headers: Vec<String>,

    /// OneBot HTTP API base URL
    #[arg(long = "notify-url", global = true)]
    pub notify_url: Option<String>,

    /// Access token for the OneBot HTTP API
    #[arg(long = "access-token", global = true)]
    pub access_token: Option<String>,

    /// Maximum number of attempts per API request
    #[arg(long = "retry-max", global = true)]
    pub retry_max: Option<u32>,

    /// Initial retry delay in seconds
    #[arg(long = "retry-delay", global = true)]
    pub retry_delay: Option<u64>,

    /// Test mode - log push messages without sending them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Chat user the command acts on.
#[derive(Debug, Clone, Args)]
pub struct UserArg {
    /// Chat user id
    #[arg(long)]
    pub user: String,
}

/// Subcommands for battle-push
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll and push until interrupted (default)
    Run,

    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = "battle-push.toml")]
        output: PathBuf,
    },

    /// Enable push for a user, to a group or as private message
    Subscribe {
        #[command(flatten)]
        user: UserArg,

        /// Camp id to watch (default: the user's current account)
        #[arg(long)]
        entity: Option<String>,

        /// Push to this group instead of a private message
        #[arg(long)]
        group: Option<String>,
    },

    /// Disable push for a group, for private messages, or entirely
    Unsubscribe {
        #[command(flatten)]
        user: UserArg,

        /// Stop pushing to this group only
        #[arg(long, conflicts_with = "direct")]
        group: Option<String>,

        /// Stop private message pushes only
        #[arg(long)]
        direct: bool,
    },

    /// Show a user's push subscription
    Status {
        #[command(flatten)]
        user: UserArg,
    },

    /// Show a user's most recent battles
    Battles {
        #[command(flatten)]
        user: UserArg,

        /// Camp id to query (default: the user's current account)
        #[arg(long)]
        entity: Option<String>,

        /// Number of battles to show (1-15)
        #[arg(long, short = 'n', default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=15))]
        count: u8,
    },

    /// Bind a camp id to a user
    Bind {
        #[command(flatten)]
        user: UserArg,

        /// Camp id
        entity: String,
    },

    /// Select the user's current camp id (1-based index)
    Switch {
        #[command(flatten)]
        user: UserArg,

        /// Position in the account list
        index: usize,
    },

    /// Remove a bound camp id (1-based index)
    Unbind {
        #[command(flatten)]
        user: UserArg,

        /// Position in the account list
        index: usize,
    },

    /// List the user's bound camp ids
    Accounts {
        #[command(flatten)]
        user: UserArg,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Some(Command::Init { .. }))
    }

    /// Returns true if the poller should run (no subcommand or `run`).
    #[must_use]
    pub const fn is_run(&self) -> bool {
        matches!(self.command, None | Some(Command::Run))
    }
}
