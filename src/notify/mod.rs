//! Notification delivery to chat destinations.
//!
//! This module provides:
//! - The delivery abstraction ([`Notifier`], [`DeliveryReport`], [`DeliveryError`])
//! - A OneBot v11 HTTP implementation ([`OneBotNotifier`])
//! - A log-only implementation for dry runs ([`LogNotifier`])
//! - Push message rendering ([`MessageTemplate`])

mod error;
mod log;
mod onebot;
mod template;

#[cfg(test)]
pub mod mock;


pub use error::{DeliveryError, TemplateError};
pub use log::LogNotifier;
pub use onebot::OneBotNotifier;
pub use template::{DEFAULT_TEMPLATE, MessageTemplate};

use std::sync::Arc;

use crate::registry::{Destination, SubscriberId};

/// Per-target outcome of one delivery.
///
/// Results keep the order of the targets passed to [`Notifier::deliver`].
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// One entry per target.
    pub results: Vec<(Destination, Result<(), DeliveryError>)>,
}

impl DeliveryReport {
    /// Records the outcome for `target`.
    pub fn push(&mut self, target: Destination, result: Result<(), DeliveryError>) {
        self.results.push((target, result));
    }

    /// Returns the number of targets that received the message.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    /// Returns the targets that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Destination, &DeliveryError)> {
        self.results
            .iter()
            .filter_map(|(target, result)| result.as_ref().err().map(|e| (target, e)))
    }

    /// Returns `true` if every target received the message.
    #[must_use]
    pub fn all_delivered(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }
}

/// Sends a rendered message to a subscriber's destinations.
///
/// Implementations make a single attempt per target: a failed target is
/// reported, never retried, so a message is delivered at most once.
pub trait Notifier: Send + Sync {
    /// Delivers `payload` to every target.
    ///
    /// [`Destination::Direct`] resolves to `subscriber`.
    fn deliver(
        &self,
        subscriber: &SubscriberId,
        targets: &[Destination],
        payload: &str,
    ) -> impl std::future::Future<Output = DeliveryReport> + Send;
}

impl<T: Notifier> Notifier for Arc<T> {
    fn deliver(
        &self,
        subscriber: &SubscriberId,
        targets: &[Destination],
        payload: &str,
    ) -> impl std::future::Future<Output = DeliveryReport> + Send {
        (**self).deliver(subscriber, targets, payload)
    }
}
