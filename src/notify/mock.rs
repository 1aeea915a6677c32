//! Recording notifier for tests.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::registry::{Destination, SubscriberId};
use crate::transport::{HttpError, RequestError};

use super::{DeliveryError, DeliveryReport, Notifier};

/// One recorded [`Notifier::deliver`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub subscriber: SubscriberId,
    pub targets: Vec<Destination>,
    pub payload: String,
}

/// Notifier that records every delivery and can fail chosen targets.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    failing: Mutex<HashSet<Destination>>,
}

impl RecordingNotifier {
    /// Creates a notifier where every target succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes deliveries to `target` fail.
    pub fn fail_target(&self, target: Destination) {
        self.failing.lock().unwrap().insert(target);
    }

    /// Returns every recorded delivery.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Returns the recorded deliveries for `subscriber`.
    pub fn deliveries_for(&self, subscriber: &str) -> Vec<Delivery> {
        self.deliveries()
            .into_iter()
            .filter(|d| d.subscriber.as_str() == subscriber)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    async fn deliver(
        &self,
        subscriber: &SubscriberId,
        targets: &[Destination],
        payload: &str,
    ) -> DeliveryReport {
        self.deliveries.lock().unwrap().push(Delivery {
            subscriber: subscriber.clone(),
            targets: targets.to_vec(),
            payload: payload.to_string(),
        });

        let failing = self.failing.lock().unwrap().clone();
        let mut report = DeliveryReport::default();
        for target in targets {
            let result = if failing.contains(target) {
                Err(DeliveryError::Request(RequestError::Http(HttpError::Timeout)))
            } else {
                Ok(())
            };
            report.push(target.clone(), result);
        }
        report
    }
}
