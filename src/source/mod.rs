//! Data source layer: fetching the latest battle record of a camp account.
//!
//! This module provides:
//! - Record and id types ([`BattleRecord`], [`EntityId`], [`Fingerprint`])
//! - The data source abstraction ([`DataSource`], [`FetchError`])
//! - The camp web API implementation ([`CampApiSource`]) with its token cache ([`TokenCache`])

mod camp;
mod fetcher;
mod record;
mod token;

#[cfg(test)]
pub mod mock;

#[cfg(test)]
mod camp_tests;

pub use camp::CampApiSource;
pub use fetcher::{DataSource, FetchError};
pub use record::{BattleRecord, EntityId, Fingerprint};
pub use token::TokenCache;
