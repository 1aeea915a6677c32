//! Background change-detection loop.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::notify::{MessageTemplate, Notifier};
use crate::registry::{Marker, Subscription, SubscriptionRegistry};
use crate::source::{BattleRecord, DataSource, FetchError};
use crate::state::KeyValueStore;

use super::{Outcome, TickReport};

/// Default upper bound for one fetch, retries included.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of subscribers processed concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Tuning of a [`Poller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Upper bound for one `fetch_latest` call.
    pub fetch_timeout: Duration,
    /// Number of subscribers processed concurrently (at least 1).
    pub max_concurrency: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl PollerConfig {
    /// Sets the fetch timeout.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Sets the concurrency bound; 0 is treated as 1.
    #[must_use]
    pub const fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = if max == 0 { 1 } else { max };
        self
    }
}

/// State shared between the handle and the loop task.
struct Inner<D, N, S, M> {
    source: D,
    notifier: N,
    registry: Arc<SubscriptionRegistry<S, M>>,
    template: MessageTemplate,
    config: PollerConfig,
    /// Held for the duration of a tick; ticks never overlap.
    tick_gate: tokio::sync::Mutex<()>,
}

struct Running {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Polls every enabled subscription on a fixed interval and notifies
/// subscribers about new battle records.
///
/// The poller is either idle or running one background loop. Each tick:
/// 1. Snapshots the enabled subscriptions
/// 2. Fetches each entity's latest record (concurrently, bounded, with a timeout)
/// 3. Establishes a baseline for subscribers without a marker
/// 4. For a changed fingerprint, stores the new marker, then notifies
///
/// The marker is written before delivery, so a record is announced at most
/// once. A failure for one subscriber is logged and skips only that
/// subscriber.
///
/// # Type Parameters
///
/// - `D`: The [`DataSource`] implementation
/// - `N`: The [`Notifier`] implementation
/// - `S`, `M`: Subscription and marker stores of the registry
pub struct Poller<D, N, S, M> {
    inner: Arc<Inner<D, N, S, M>>,
    running: Mutex<Option<Running>>,
}

impl<D, N, S, M> Poller<D, N, S, M>
where
    D: DataSource + 'static,
    N: Notifier + 'static,
    S: KeyValueStore<Subscription> + 'static,
    M: KeyValueStore<Marker> + 'static,
{
    /// Creates an idle poller.
    #[must_use]
    pub fn new(
        source: D,
        notifier: N,
        registry: Arc<SubscriptionRegistry<S, M>>,
        template: MessageTemplate,
        config: PollerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                notifier,
                registry,
                template,
                config: config.with_max_concurrency(config.max_concurrency),
                tick_gate: tokio::sync::Mutex::new(()),
            }),
            running: Mutex::new(None),
        }
    }

    /// Starts the polling loop with the given interval.
    ///
    /// The first tick runs immediately. Returns `false` without doing
    /// anything if a loop is already running.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self, interval: Duration) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            tracing::debug!("Poller already running");
            return false;
        }

        let (cancel, cancelled) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(run_loop(inner, interval, cancelled));
        *running = Some(Running { cancel, handle });

        tracing::info!("Poller started, checking every {}s", interval.as_secs());
        true
    }

    /// Requests the loop to stop and returns immediately.
    ///
    /// A tick in progress finishes its in-flight work; no further tick
    /// starts. Returns `false` if the poller was idle.
    pub fn stop(&self) -> bool {
        let Some(running) = self.take_running() else {
            return false;
        };
        // Dropping the handle detaches the task; it exits on its own.
        let _ = running.cancel.send(true);
        tracing::info!("Poller stop requested");
        true
    }

    /// Stops the loop and waits for it to exit.
    ///
    /// Used for graceful shutdown so that in-flight marker writes complete.
    pub async fn stop_and_wait(&self) {
        let Some(running) = self.take_running() else {
            return;
        };
        let _ = running.cancel.send(true);
        if let Err(e) = running.handle.await {
            tracing::error!("Poller task failed: {e}");
        }
        tracing::info!("Poller stopped");
    }

    /// Returns `true` while a loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Runs a single tick now, independent of the loop.
    ///
    /// Waits for a tick in progress to finish first.
    pub async fn tick(&self) -> TickReport {
        tick(&self.inner).await
    }

    fn take_running(&self) -> Option<Running> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<D, N, S, M> Drop for Poller<D, N, S, M> {
    fn drop(&mut self) {
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            let _ = running.cancel.send(true);
        }
    }
}

async fn run_loop<D, N, S, M>(
    inner: Arc<Inner<D, N, S, M>>,
    interval: Duration,
    mut cancelled: watch::Receiver<bool>,
) where
    D: DataSource + 'static,
    N: Notifier + 'static,
    S: KeyValueStore<Subscription> + 'static,
    M: KeyValueStore<Marker> + 'static,
{
    loop {
        if *cancelled.borrow_and_update() {
            break;
        }

        let report = tick(&inner).await;
        tracing::debug!("Tick finished: {report}");

        tokio::select! {
            biased;
            // Also fires when the handle is dropped.
            _ = cancelled.changed() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    tracing::debug!("Poller loop exited");
}

async fn tick<D, N, S, M>(inner: &Arc<Inner<D, N, S, M>>) -> TickReport
where
    D: DataSource + 'static,
    N: Notifier + 'static,
    S: KeyValueStore<Subscription> + 'static,
    M: KeyValueStore<Marker> + 'static,
{
    let _gate = inner.tick_gate.lock().await;

    let subscriptions = inner.registry.list_enabled();
    let mut report = TickReport {
        attempted: subscriptions.len(),
        ..TickReport::default()
    };

    let permits = Arc::new(Semaphore::new(inner.config.max_concurrency));
    let mut tasks = JoinSet::new();
    for subscription in subscriptions {
        let inner = Arc::clone(inner);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return Outcome::Skipped;
            };
            process(&inner, &subscription).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => report.record(outcome),
            Err(e) => {
                tracing::error!("Subscriber task failed: {e}");
                report.record(Outcome::Skipped);
            }
        }
    }
    report
}

/// Runs fetch, compare, mark and notify for one subscriber.
async fn process<D, N, S, M>(inner: &Inner<D, N, S, M>, subscription: &Subscription) -> Outcome
where
    D: DataSource,
    N: Notifier,
    S: KeyValueStore<Subscription>,
    M: KeyValueStore<Marker>,
{
    let subscriber = &subscription.subscriber_id;
    let entity = &subscription.entity_id;

    let fetched = tokio::time::timeout(
        inner.config.fetch_timeout,
        inner.source.fetch_latest(entity),
    )
    .await
    .unwrap_or_else(|_| Err(FetchError::Timeout(inner.config.fetch_timeout)));

    let record = match fetched {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::debug!(subscriber = %subscriber, entity = %entity, "No battle records yet");
            return Outcome::NoData;
        }
        Err(e) => {
            tracing::warn!(subscriber = %subscriber, entity = %entity, stage = "fetch", "Skipping: {e}");
            return Outcome::Skipped;
        }
    };

    let fingerprint = record.fingerprint();
    let previous = inner.registry.marker(subscriber);
    let previous = previous.as_ref().and_then(|m| m.fingerprint_for(entity));
    if previous == Some(&fingerprint) {
        return Outcome::Unchanged;
    }
    let is_baseline = previous.is_none();

    let marker = Marker::new(entity.clone(), fingerprint.clone());
    match inner.registry.record_marker_if_subscribed(subscriber, marker).await {
        Ok(true) => {}
        Ok(false) => {
            // Unsubscribed or switched entity while this tick was fetching.
            tracing::debug!(subscriber = %subscriber, entity = %entity, "Subscription changed during tick");
            return Outcome::Skipped;
        }
        Err(e) => {
            tracing::warn!(subscriber = %subscriber, entity = %entity, stage = "marker", "Skipping: {e}");
            return Outcome::Skipped;
        }
    }

    if is_baseline {
        tracing::info!(subscriber = %subscriber, entity = %entity, record = %fingerprint, "Baseline established");
        return Outcome::Baselined;
    }

    tracing::info!(subscriber = %subscriber, entity = %entity, record = %fingerprint, "New battle record");
    announce(inner, subscription, &record).await
}

/// Renders and delivers the push message for a new record.
async fn announce<D, N, S, M>(
    inner: &Inner<D, N, S, M>,
    subscription: &Subscription,
    record: &BattleRecord,
) -> Outcome
where
    N: Notifier,
{
    let subscriber = &subscription.subscriber_id;
    let entity = &subscription.entity_id;
    let targets = &subscription.delivery_targets;

    let payload = match inner.template.render(entity, record) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(subscriber = %subscriber, entity = %entity, stage = "render", "Not notified: {e}");
            return Outcome::Notified {
                delivered: 0,
                failed: targets.len(),
            };
        }
    };

    let delivery = inner.notifier.deliver(subscriber, targets, &payload).await;
    for (target, e) in delivery.failures() {
        tracing::warn!(
            subscriber = %subscriber,
            entity = %entity,
            stage = "deliver",
            target = %target,
            "Delivery failed: {e}"
        );
    }
    Outcome::Notified {
        delivered: delivery.delivered(),
        failed: delivery.failures().count(),
    }
}
