//! Application execution logic.
//!
//! This module runs the poller until a shutdown signal arrives, and
//! implements the subscription and account management subcommands.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::signal;

use battle_push::accounts::{AccountBook, AccountError, AccountList};
use battle_push::config::{Command, ValidatedConfig};
use battle_push::monitor::Poller;
use battle_push::notify::{LogNotifier, MessageTemplate, Notifier, OneBotNotifier, TemplateError};
use battle_push::registry::{
    Destination, Marker, RegistryError, SubscriberId, Subscription, SubscriptionRegistry,
    Unsubscribed,
};
use battle_push::source::{CampApiSource, EntityId, FetchError, TokenCache};
use battle_push::state::JsonFileStore;
use battle_push::time::{Clock, Sleeper};
use battle_push::transport::{HttpClient, ReqwestClient};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// File holding subscriptions, below the data directory.
pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";

/// File holding last-seen markers, below the data directory.
pub const MARKERS_FILE: &str = "markers.json";

/// File holding account bindings, below the data directory.
pub const ACCOUNTS_FILE: &str = "accounts.json";

/// Registry over the JSON state files.
pub type FileRegistry = SubscriptionRegistry<JsonFileStore<Subscription>, JsonFileStore<Marker>>;

/// Account book over the JSON state file.
pub type FileAccounts = AccountBook<JsonFileStore<AccountList>>;

/// Data source used by the application.
type AppSource = CampApiSource<ReqwestClient>;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// Failed to install the shutdown signal handlers.
    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// A subscription change failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An account change failed.
    #[error(transparent)]
    Accounts(#[from] AccountError),

    /// Battles could not be fetched.
    #[error("Failed to fetch battles: {0}")]
    Fetch(#[from] FetchError),

    /// A battle could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// `subscribe` or `battles` without `--entity` for a user with no bound account.
    #[error("{0} has no bound account; pass --entity or run 'bind' first")]
    NoCurrentAccount(SubscriberId),

    /// The command is not a management subcommand.
    #[error("'{0}' is not a management command")]
    NotManagement(&'static str),
}

/// Opened state stores.
pub struct Stores {
    /// Subscriptions and markers.
    pub registry: Arc<FileRegistry>,
    /// Account bindings.
    pub accounts: FileAccounts,
}

impl Stores {
    /// Opens (or starts empty) every state file under `data_dir`.
    pub fn open(data_dir: &Path) -> Self {
        let registry = SubscriptionRegistry::new(
            JsonFileStore::open(data_dir.join(SUBSCRIPTIONS_FILE)),
            JsonFileStore::open(data_dir.join(MARKERS_FILE)),
        );
        Self {
            registry: Arc::new(registry),
            accounts: AccountBook::new(JsonFileStore::open(data_dir.join(ACCOUNTS_FILE))),
        }
    }
}

/// Runs the poller until a shutdown signal (Ctrl+C or SIGTERM) arrives.
///
/// The poller is stopped gracefully: an in-flight tick finishes before
/// this function returns.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed.
///
/// # Coverage Note
///
/// This function is excluded from coverage because it requires a real
/// async runtime with signal handling.
#[cfg(not(tarpaulin_include))]
pub async fn execute(config: ValidatedConfig) -> Result<(), RunError> {
    let stores = Stores::open(&config.data_dir);
    tracing::info!(
        "State directory: {}, {} active subscription(s)",
        config.data_dir.display(),
        stores.registry.list_enabled().len()
    );

    let source = create_source(&config);

    match (&config.notify_url, config.dry_run) {
        (Some(url), false) => {
            let mut notifier =
                OneBotNotifier::new(ReqwestClient::with_timeout(config.request_timeout), url.clone());
            if let Some(ref token) = config.access_token {
                notifier = notifier.with_access_token(token.clone());
            }
            tracing::info!("Pushing to bot API at {}", notifier.base_url());
            run_poller(source, notifier, stores.registry, config).await
        }
        (Some(_), true) => {
            tracing::info!("Dry-run mode enabled - push messages will be logged but not sent");
            run_poller(source, LogNotifier, stores.registry, config).await
        }
        (None, _) => {
            tracing::info!("No bot API configured - push messages will only be logged");
            run_poller(source, LogNotifier, stores.registry, config).await
        }
    }
}

/// Creates the camp API source from configuration.
fn create_source(config: &ValidatedConfig) -> AppSource {
    let tokens = config
        .token_url
        .clone()
        .map_or_else(TokenCache::disabled, TokenCache::new);

    CampApiSource::new(
        ReqwestClient::with_timeout(config.request_timeout),
        config.api_url.clone(),
    )
    .with_headers(config.api_headers.clone())
    .with_retry_policy(config.retry_policy.clone())
    .with_tokens(tokens)
}

/// Drives the poller with `notifier` until shutdown.
///
/// Excluded from coverage - requires signal handling.
#[cfg(not(tarpaulin_include))]
async fn run_poller<N: Notifier + 'static>(
    source: AppSource,
    notifier: N,
    registry: Arc<FileRegistry>,
    config: ValidatedConfig,
) -> Result<(), RunError> {
    let poller = Poller::new(
        source,
        notifier,
        registry,
        config.message_template,
        config.poller,
    );
    poller.start(config.poll_interval);

    let signal = shutdown_signal().await;
    match signal {
        Ok(()) => tracing::info!("Shutdown signal received, stopping..."),
        Err(ref e) => tracing::error!("Signal handling failed, stopping: {e}"),
    }

    poller.stop_and_wait().await;
    signal.map_err(RunError::Signal)
}

/// Runs a management subcommand and returns the text to print.
///
/// # Errors
///
/// Returns the registry or account error of the failed change, or
/// [`RunError::NotManagement`] for `run` and `init`.
pub async fn manage(command: Command, stores: &Stores) -> Result<String, RunError> {
    match command {
        Command::Subscribe {
            user,
            entity,
            group,
        } => {
            let user = SubscriberId::new(user.user);
            let entity = resolve_entity(&stores.accounts, &user, entity)?;
            let target = group.map_or(Destination::Direct, Destination::Group);

            let subscription = stores.registry.subscribe(&user, entity, target).await?;
            Ok(format!("Subscribed.\n{}", describe(&subscription, None)))
        }
        Command::Unsubscribe {
            user,
            group,
            direct,
        } => {
            let user = SubscriberId::new(user.user);
            let target = match (group, direct) {
                (Some(group), _) => Some(Destination::Group(group)),
                (None, true) => Some(Destination::Direct),
                (None, false) => None,
            };

            match stores.registry.unsubscribe(&user, target.as_ref()).await? {
                Unsubscribed::Removed => Ok(format!("Removed the subscription of {user}.")),
                Unsubscribed::TargetRemoved(subscription) => Ok(format!(
                    "Target removed.\n{}",
                    describe(&subscription, None)
                )),
            }
        }
        Command::Status { user } => {
            let user = SubscriberId::new(user.user);
            Ok(stores.registry.get(&user).map_or_else(
                || format!("{user} has no subscription."),
                |subscription| describe(&subscription, stores.registry.marker(&user).as_ref()),
            ))
        }
        Command::Bind { user, entity } => {
            let user = SubscriberId::new(user.user);
            let list = stores.accounts.bind(&user, EntityId::new(entity)).await?;
            Ok(format!("Bound.\n{list}"))
        }
        Command::Switch { user, index } => {
            let user = SubscriberId::new(user.user);
            let list = stores.accounts.switch(&user, index).await?;
            Ok(format!("Switched.\n{list}"))
        }
        Command::Unbind { user, index } => {
            let user = SubscriberId::new(user.user);
            let (removed, list) = stores.accounts.unbind(&user, index).await?;
            if list.is_empty() {
                Ok(format!("Unbound {removed}. No accounts left."))
            } else {
                Ok(format!("Unbound {removed}.\n{list}"))
            }
        }
        Command::Accounts { user } => {
            let user = SubscriberId::new(user.user);
            let list = stores.accounts.list(&user);
            if list.is_empty() {
                Ok(format!("{user} has no bound accounts."))
            } else {
                Ok(list.to_string())
            }
        }
        Command::Battles { .. } => Err(RunError::NotManagement("battles")),
        Command::Run => Err(RunError::NotManagement("run")),
        Command::Init { .. } => Err(RunError::NotManagement("init")),
    }
}

/// Returns `entity`, or the user's current account when it is absent.
fn resolve_entity(
    accounts: &FileAccounts,
    user: &SubscriberId,
    entity: Option<String>,
) -> Result<EntityId, RunError> {
    match entity {
        Some(entity) => Ok(EntityId::new(entity)),
        None => accounts
            .current(user)
            .ok_or_else(|| RunError::NoCurrentAccount(user.clone())),
    }
}

/// Runs the `battles` subcommand against the configured camp API.
///
/// # Errors
///
/// Returns [`RunError::NotManagement`] for any other command, or the
/// error of the failed lookup, fetch or rendering.
#[cfg(not(tarpaulin_include))]
pub async fn query_battles(command: Command, config: &ValidatedConfig) -> Result<String, RunError> {
    let Command::Battles {
        user,
        entity,
        count,
    } = command
    else {
        return Err(RunError::NotManagement("query"));
    };

    let stores = Stores::open(&config.data_dir);
    let source = create_source(config);
    battles(
        &source,
        &config.message_template,
        &stores.accounts,
        &SubscriberId::new(user.user),
        entity,
        usize::from(count),
    )
    .await
}

/// Fetches up to `count` recent battles and renders each with `template`.
///
/// # Errors
///
/// Returns [`RunError::NoCurrentAccount`] when no entity is given and none
/// is bound, or the fetch or rendering error.
pub async fn battles<H: HttpClient, S: Sleeper, C: Clock>(
    source: &CampApiSource<H, S, C>,
    template: &MessageTemplate,
    accounts: &FileAccounts,
    user: &SubscriberId,
    entity: Option<String>,
    count: usize,
) -> Result<String, RunError> {
    let entity = resolve_entity(accounts, user, entity)?;
    let records = source.fetch_recent(&entity, count).await?;
    if records.is_empty() {
        return Ok(format!("{entity} has no battles yet."));
    }

    let mut text = format!("Recent battles of {entity}:");
    for (position, record) in records.iter().enumerate() {
        let rendered = template.render(&entity, record)?;
        let _ = write!(text, "\n\n#{}\n{rendered}", position + 1);
    }
    Ok(text)
}

/// Formats a subscription (and its marker, if known) for display.
fn describe(subscription: &Subscription, marker: Option<&Marker>) -> String {
    let targets = subscription
        .delivery_targets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let state = if subscription.enabled {
        "enabled"
    } else {
        "disabled"
    };

    let mut text = format!(
        "{} watches {} ({state})\ntargets: {}",
        subscription.subscriber_id,
        subscription.entity_id,
        if targets.is_empty() { "none" } else { targets.as_str() },
    );
    if let Some(fingerprint) = marker.and_then(|m| m.fingerprint_for(&subscription.entity_id)) {
        let _ = write!(text, "\nlast seen: {fingerprint}");
    }
    text
}

/// Returns once a shutdown signal is received.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    #[cfg(unix)]
    let terminate = sigterm.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = signal::ctrl_c() => result,
        _ = terminate => Ok(()),
    }
}
