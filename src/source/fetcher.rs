//! Data source trait and error types.

use std::sync::Arc;

use thiserror::Error;

use crate::transport::RequestError;

use super::{BattleRecord, EntityId};

/// Error type for fetching the latest record.
///
/// Every variant means "currently unavailable": the poller skips the
/// subscriber for this tick and tries again on the next one.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP request failed (after retries, where applicable).
    #[error("Request failed: {0}")]
    Request(#[from] RequestError),

    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The API answered with an error code instead of data.
    #[error("API returned code {code}: {message}")]
    Api {
        /// The API's `returnCode`.
        code: i64,
        /// The API's message, if any.
        message: String,
    },

    /// The fetch did not finish within the allowed time.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Trait for fetching the most recent record of an entity.
///
/// Implementations hide transport details (authentication, retries) behind
/// this contract. "No record yet" is `Ok(None)`, distinct from an error.
pub trait DataSource: Send + Sync {
    /// Fetches the latest record for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the record is currently unavailable.
    fn fetch_latest(
        &self,
        entity: &EntityId,
    ) -> impl std::future::Future<Output = Result<Option<BattleRecord>, FetchError>> + Send;
}

impl<T: DataSource> DataSource for Arc<T> {
    fn fetch_latest(
        &self,
        entity: &EntityId,
    ) -> impl std::future::Future<Output = Result<Option<BattleRecord>, FetchError>> + Send {
        (**self).fetch_latest(entity)
    }
}
