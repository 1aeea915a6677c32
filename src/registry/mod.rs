//! Subscription registry backed by durable key-value stores.
//!
//! The registry owns two namespaces:
//! - subscriptions, keyed by subscriber id
//! - last-seen markers, keyed by subscriber id (written only by the poller)
//!
//! Every mutation is persisted before the call returns.

mod subscription;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

pub use subscription::{Destination, Marker, ParseDestinationError, SubscriberId, Subscription};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::source::EntityId;
use crate::state::{KeyValueStore, StateError};

/// Errors returned by registry mutations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No subscription exists for the subscriber.
    #[error("No subscription for {0}")]
    NotFound(SubscriberId),

    /// The subscription exists but the target is not registered.
    #[error("{subscriber} has no delivery target {target}")]
    TargetNotFound {
        /// Subscriber whose subscription was modified.
        subscriber: SubscriberId,
        /// Target that was not registered.
        target: Destination,
    },

    /// Persisting the change failed.
    #[error(transparent)]
    Store(#[from] StateError),
}

/// Outcome of a successful [`SubscriptionRegistry::unsubscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsubscribed {
    /// A single target was removed; the remaining subscription is returned.
    /// It is disabled if no targets remain.
    TargetRemoved(Subscription),
    /// The whole subscription (and its marker) was removed.
    Removed,
}

/// CRUD over subscriptions.
///
/// Mutations are serialized by an internal gate so concurrent
/// `subscribe`/`unsubscribe` calls for the same subscriber cannot lose
/// updates.
#[derive(Debug)]
pub struct SubscriptionRegistry<S, M> {
    subscriptions: S,
    markers: M,
    mutation_gate: Mutex<()>,
}

impl<S, M> SubscriptionRegistry<S, M>
where
    S: KeyValueStore<Subscription>,
    M: KeyValueStore<Marker>,
{
    /// Creates a registry over the given stores.
    pub fn new(subscriptions: S, markers: M) -> Self {
        Self {
            subscriptions,
            markers,
            mutation_gate: Mutex::new(()),
        }
    }

    /// Subscribes `subscriber` to `entity`, delivering to `target`.
    ///
    /// Creates the subscription if needed. Otherwise adds `target` (no-op if
    /// already present), switches the entity if it changed and re-enables a
    /// disabled subscription.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] if the change cannot be persisted.
    pub async fn subscribe(
        &self,
        subscriber: &SubscriberId,
        entity: EntityId,
        target: Destination,
    ) -> Result<Subscription, RegistryError> {
        let _gate = self.mutation_gate.lock().await;

        let updated = match self.subscriptions.get(subscriber.as_str()) {
            None => Subscription::new(subscriber.clone(), entity, target),
            Some(existing) => {
                let mut updated = existing.clone();
                if !updated.has_target(&target) {
                    updated.delivery_targets.push(target);
                }
                updated.entity_id = entity;
                updated.enabled = true;
                if updated == existing {
                    return Ok(existing);
                }
                updated
            }
        };

        self.subscriptions
            .put(subscriber.as_str(), updated.clone())
            .await?;
        tracing::debug!(
            subscriber = %subscriber,
            entity = %updated.entity_id,
            targets = updated.delivery_targets.len(),
            "Subscription saved"
        );
        Ok(updated)
    }

    /// Removes `target`, or the whole subscription when `target` is `None`.
    ///
    /// Removing the last target disables the subscription but keeps it.
    /// Removing the whole subscription also deletes its marker.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotFound`] if `subscriber` has no subscription
    /// - [`RegistryError::TargetNotFound`] if `target` is not registered
    /// - [`RegistryError::Store`] if the change cannot be persisted
    pub async fn unsubscribe(
        &self,
        subscriber: &SubscriberId,
        target: Option<&Destination>,
    ) -> Result<Unsubscribed, RegistryError> {
        let _gate = self.mutation_gate.lock().await;

        let Some(mut subscription) = self.subscriptions.get(subscriber.as_str()) else {
            return Err(RegistryError::NotFound(subscriber.clone()));
        };

        let Some(target) = target else {
            self.subscriptions.remove(subscriber.as_str()).await?;
            self.markers.remove(subscriber.as_str()).await?;
            tracing::debug!(subscriber = %subscriber, "Subscription removed");
            return Ok(Unsubscribed::Removed);
        };

        if !subscription.has_target(target) {
            return Err(RegistryError::TargetNotFound {
                subscriber: subscriber.clone(),
                target: target.clone(),
            });
        }

        subscription.delivery_targets.retain(|t| t != target);
        if subscription.delivery_targets.is_empty() {
            subscription.enabled = false;
        }
        self.subscriptions
            .put(subscriber.as_str(), subscription.clone())
            .await?;
        tracing::debug!(
            subscriber = %subscriber,
            target = %target,
            enabled = subscription.enabled,
            "Delivery target removed"
        );
        Ok(Unsubscribed::TargetRemoved(subscription))
    }

    /// Returns the subscription for `subscriber`, enabled or not.
    #[must_use]
    pub fn get(&self, subscriber: &SubscriberId) -> Option<Subscription> {
        self.subscriptions.get(subscriber.as_str())
    }

    /// Returns a snapshot of all enabled subscriptions, sorted by subscriber id.
    #[must_use]
    pub fn list_enabled(&self) -> Vec<Subscription> {
        let mut enabled: Vec<_> = self
            .subscriptions
            .entries()
            .into_iter()
            .map(|(_, subscription)| subscription)
            .filter(|s| s.enabled && !s.delivery_targets.is_empty())
            .collect();
        enabled.sort_by(|a, b| a.subscriber_id.cmp(&b.subscriber_id));
        enabled
    }

    /// Returns the last-seen marker of `subscriber`.
    #[must_use]
    pub fn marker(&self, subscriber: &SubscriberId) -> Option<Marker> {
        self.markers.get(subscriber.as_str())
    }

    /// Stores the last-seen marker of `subscriber` if it is still
    /// subscribed to the marker's entity.
    ///
    /// Check and write happen under the mutation gate, so a concurrent
    /// `unsubscribe` either runs first (nothing is written) or deletes the
    /// marker afterwards. Returns `false` when nothing was written.
    ///
    /// Only the poller calls this.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be persisted.
    pub async fn record_marker_if_subscribed(
        &self,
        subscriber: &SubscriberId,
        marker: Marker,
    ) -> Result<bool, StateError> {
        let _gate = self.mutation_gate.lock().await;

        let subscribed = self
            .subscriptions
            .get(subscriber.as_str())
            .is_some_and(|s| s.entity_id == marker.entity_id);
        if !subscribed {
            return Ok(false);
        }

        self.markers.put(subscriber.as_str(), marker).await?;
        Ok(true)
    }
}
