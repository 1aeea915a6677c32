//! Log-only notifier.

use crate::registry::{Destination, SubscriberId};

use super::{DeliveryReport, Notifier};

/// Notifier that writes every message to the log instead of sending it.
///
/// Used for `--dry-run` and when no bot API is configured. Every target is
/// reported as delivered.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn deliver(
        &self,
        subscriber: &SubscriberId,
        targets: &[Destination],
        payload: &str,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for target in targets {
            tracing::info!(subscriber = %subscriber, target = %target, "Push:\n{payload}");
            report.push(target.clone(), Ok(()));
        }
        report
    }
}
