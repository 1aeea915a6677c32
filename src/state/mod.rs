//! Durable key-value state shared by the registry, the poller and the account book.
//!
//! This module provides the [`KeyValueStore`] abstraction and its JSON file
//! implementation ([`JsonFileStore`]). Every store file holds one namespace
//! (subscriptions, last-seen markers, accounts).

mod file;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

pub use file::{JsonFileStore, STATE_FILE_VERSION};

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Result of loading a store file from disk.
///
/// Explicitly models all valid states:
/// - Successfully loaded previous entries
/// - No file exists yet (first run)
/// - The file exists but is unreadable or corrupted
#[derive(Debug, Clone)]
pub enum LoadResult<V> {
    /// Successfully loaded previously saved entries.
    Loaded(BTreeMap<String, V>),

    /// No state file exists.
    NotFound,

    /// State file exists but could not be parsed.
    /// The store starts empty and overwrites the file on the next write.
    Corrupted {
        /// Reason for corruption (for logging/debugging).
        reason: String,
    },
}

impl<V> LoadResult<V> {
    /// Returns the loaded entries, or an empty map for `NotFound`/`Corrupted`.
    #[must_use]
    pub fn into_entries(self) -> BTreeMap<String, V> {
        match self {
            Self::Loaded(entries) => entries,
            Self::NotFound | Self::Corrupted { .. } => BTreeMap::new(),
        }
    }

    /// Returns `true` if state was successfully loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// Errors that can occur while persisting state.
///
/// Only covers write-side errors; read-side issues are modeled
/// as [`LoadResult`] variants to allow graceful degradation.
#[derive(Debug, Error)]
pub enum StateError {
    /// Failed to write the state file.
    #[error("Failed to write state file: {0}")]
    Write(#[source] io::Error),

    /// Failed to take the lock that serializes writers across processes.
    #[error("Failed to lock state file: {0}")]
    Lock(#[source] io::Error),

    /// Failed to serialize state to JSON.
    #[error("Failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The background write task was cancelled or panicked.
    #[error("State write task failed: {0}")]
    Task(String),
}

/// Key-value persistence with write-through durability.
///
/// A successful `put`/`remove` has reached durable storage before it
/// returns; a failed one leaves both the stored and the in-memory state
/// unchanged. Reads reflect every completed write, including writes made
/// through another handle on the same storage.
pub trait KeyValueStore<V>: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<V>;

    /// Returns every entry, sorted by key.
    fn entries(&self) -> Vec<(String, V)>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    fn put(
        &self,
        key: &str,
        value: V,
    ) -> impl std::future::Future<Output = Result<(), StateError>> + Send;

    /// Removes `key`, returning whether it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    fn remove(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bool, StateError>> + Send;
}

impl<V, T: KeyValueStore<V>> KeyValueStore<V> for Arc<T> {
    fn get(&self, key: &str) -> Option<V> {
        (**self).get(key)
    }

    fn entries(&self) -> Vec<(String, V)> {
        (**self).entries()
    }

    fn put(
        &self,
        key: &str,
        value: V,
    ) -> impl std::future::Future<Output = Result<(), StateError>> + Send {
        (**self).put(key, value)
    }

    fn remove(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bool, StateError>> + Send {
        (**self).remove(key)
    }
}
