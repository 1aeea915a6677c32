//! Per-user camp account bindings.
//!
//! A user binds one or more camp ids and selects one as "current"; the
//! current id is what `subscribe` falls back to when no entity is given.
//! Indices are 1-based, as shown to users.

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::registry::SubscriberId;
use crate::source::EntityId;
use crate::state::{KeyValueStore, StateError};

/// Errors returned by [`AccountBook`] operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The id is already in the user's list.
    #[error("Account {0} is already bound")]
    AlreadyBound(EntityId),

    /// The user has no bound accounts.
    #[error("No accounts bound")]
    NoAccounts,

    /// The 1-based index is out of range.
    #[error("Invalid index {index}: expected 1-{len}")]
    InvalidIndex {
        /// Index given by the user.
        index: usize,
        /// Number of bound accounts.
        len: usize,
    },

    /// Persisting the change failed.
    #[error(transparent)]
    Store(#[from] StateError),
}

/// A user's bound accounts and the selected one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountList {
    /// Bound ids in binding order.
    pub ids: Vec<EntityId>,
    /// 0-based position of the current id.
    pub current: usize,
}

impl AccountList {
    /// Returns the selected id, if any.
    #[must_use]
    pub fn current_id(&self) -> Option<&EntityId> {
        self.ids.get(self.current)
    }

    /// Returns `true` if no ids are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn position(&self, index: usize) -> Result<usize, AccountError> {
        if self.ids.is_empty() {
            return Err(AccountError::NoAccounts);
        }
        if index == 0 || index > self.ids.len() {
            return Err(AccountError::InvalidIndex {
                index,
                len: self.ids.len(),
            });
        }
        Ok(index - 1)
    }
}

impl fmt::Display for AccountList {
    /// One line per id, `✅` marking the current one.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.ids.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let mark = if i == self.current { "✅" } else { "☑️" };
            write!(f, "{mark} {}. {id}", i + 1)?;
        }
        Ok(())
    }
}

/// Account bindings persisted through a [`KeyValueStore`].
#[derive(Debug)]
pub struct AccountBook<S> {
    store: S,
    mutation_gate: Mutex<()>,
}

impl<S: KeyValueStore<AccountList>> AccountBook<S> {
    /// Creates an account book over `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            mutation_gate: Mutex::new(()),
        }
    }

    /// Returns the user's accounts (empty if none).
    #[must_use]
    pub fn list(&self, user: &SubscriberId) -> AccountList {
        self.store.get(user.as_str()).unwrap_or_default()
    }

    /// Returns the user's current account.
    #[must_use]
    pub fn current(&self, user: &SubscriberId) -> Option<EntityId> {
        self.list(user).current_id().cloned()
    }

    /// Appends `entity` to the user's accounts.
    ///
    /// The first bound account becomes current.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::AlreadyBound`] for a duplicate, or
    /// [`AccountError::Store`] if the change cannot be persisted.
    pub async fn bind(
        &self,
        user: &SubscriberId,
        entity: EntityId,
    ) -> Result<AccountList, AccountError> {
        let _gate = self.mutation_gate.lock().await;
        let mut list = self.list(user);

        if list.ids.contains(&entity) {
            return Err(AccountError::AlreadyBound(entity));
        }
        list.ids.push(entity);
        if list.ids.len() == 1 {
            list.current = 0;
        }

        self.store.put(user.as_str(), list.clone()).await?;
        tracing::info!(user = %user, count = list.ids.len(), "Account bound");
        Ok(list)
    }

    /// Makes the account at 1-based `index` current.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::NoAccounts`] or [`AccountError::InvalidIndex`]
    /// for a bad index, or [`AccountError::Store`] if persisting fails.
    pub async fn switch(
        &self,
        user: &SubscriberId,
        index: usize,
    ) -> Result<AccountList, AccountError> {
        let _gate = self.mutation_gate.lock().await;
        let mut list = self.list(user);

        list.current = list.position(index)?;

        self.store.put(user.as_str(), list.clone()).await?;
        tracing::info!(user = %user, index, "Account switched");
        Ok(list)
    }

    /// Removes the account at 1-based `index`.
    ///
    /// The current account stays selected when another one is removed;
    /// removing the current account selects its successor, or the last one.
    ///
    /// # Errors
    ///
    /// Same as [`AccountBook::switch`].
    pub async fn unbind(
        &self,
        user: &SubscriberId,
        index: usize,
    ) -> Result<(EntityId, AccountList), AccountError> {
        let _gate = self.mutation_gate.lock().await;
        let mut list = self.list(user);

        let position = list.position(index)?;
        let removed = list.ids.remove(position);
        if position < list.current {
            list.current -= 1;
        }
        list.current = list.current.min(list.ids.len().saturating_sub(1));

        if list.is_empty() {
            self.store.remove(user.as_str()).await?;
        } else {
            self.store.put(user.as_str(), list.clone()).await?;
        }
        tracing::info!(user = %user, remaining = list.ids.len(), "Account unbound");
        Ok((removed, list))
    }
}
