//! Subscription and marker types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::{EntityId, Fingerprint};

/// Opaque identifier of a chat user who receives notifications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    /// Creates a subscriber id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Where a notification is sent.
///
/// Serialized as `"direct"` or `"group:<id>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Destination {
    /// Private message to the subscriber.
    Direct,
    /// A group channel.
    Group(String),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Group(id) => write!(f, "group:{id}"),
        }
    }
}

/// Error returned when a destination string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid destination '{0}': expected 'direct' or 'group:<id>'")]
pub struct ParseDestinationError(String);

impl FromStr for Destination {
    type Err = ParseDestinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s == "direct" => Ok(Self::Direct),
            Some(("group", id)) if !id.trim().is_empty() => Ok(Self::Group(id.trim().to_string())),
            _ => Err(ParseDestinationError(s.to_string())),
        }
    }
}

impl From<Destination> for String {
    fn from(destination: Destination) -> Self {
        destination.to_string()
    }
}

impl TryFrom<String> for Destination {
    type Error = ParseDestinationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A subscriber's request to be notified about one entity's new battles.
///
/// `delivery_targets` is an ordered set: insertion order is kept and
/// duplicates are never stored. An enabled subscription always has at
/// least one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Who is notified.
    pub subscriber_id: SubscriberId,
    /// Whose battle records are polled.
    pub entity_id: EntityId,
    /// Where notifications are delivered.
    pub delivery_targets: Vec<Destination>,
    /// Disabled subscriptions are kept but not polled.
    pub enabled: bool,
}

impl Subscription {
    /// Creates an enabled subscription with a single target.
    #[must_use]
    pub fn new(subscriber_id: SubscriberId, entity_id: EntityId, target: Destination) -> Self {
        Self {
            subscriber_id,
            entity_id,
            delivery_targets: vec![target],
            enabled: true,
        }
    }

    /// Returns `true` if `target` is registered.
    #[must_use]
    pub fn has_target(&self, target: &Destination) -> bool {
        self.delivery_targets.contains(target)
    }
}

/// The last battle record seen for a subscriber.
///
/// The entity is recorded alongside the fingerprint so that switching a
/// subscription to another account starts from a fresh baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// Entity the fingerprint was observed for.
    pub entity_id: EntityId,
    /// Fingerprint of the last seen record.
    pub fingerprint: Fingerprint,
}

impl Marker {
    /// Creates a marker.
    #[must_use]
    pub const fn new(entity_id: EntityId, fingerprint: Fingerprint) -> Self {
        Self {
            entity_id,
            fingerprint,
        }
    }

    /// Returns the fingerprint if this marker belongs to `entity`.
    #[must_use]
    pub fn fingerprint_for(&self, entity: &EntityId) -> Option<&Fingerprint> {
        (&self.entity_id == entity).then_some(&self.fingerprint)
    }
}
