//! Change-detection poller.
//!
//! This module provides:
//! - The background polling loop ([`Poller`]) and its tuning ([`PollerConfig`])
//! - Per-tick outcome counts ([`TickReport`])

mod poller;
mod report;


pub use poller::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_CONCURRENCY, Poller, PollerConfig};
pub use report::{Outcome, TickReport};
