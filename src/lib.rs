//! battle-push: battle record notifications
//!
//! A library for watching the match history of camp API accounts and
//! pushing every newly observed battle record to chat destinations.
//!
//! The core is the change-detection [`monitor::Poller`]: each tick it
//! fetches the latest record per [`registry::Subscription`], compares its
//! fingerprint with the persisted last-seen marker and notifies only when
//! the record changed.

pub mod accounts;
pub mod config;
pub mod monitor;
pub mod notify;
pub mod registry;
pub mod source;
pub mod state;
pub mod time;
pub mod transport;
