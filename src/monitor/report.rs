//! Tick outcome bookkeeping.

use std::fmt;

/// What happened to one subscriber during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First record seen; stored as the baseline without notifying.
    Baselined,
    /// A new record was seen and a notification attempted.
    Notified {
        /// Targets that received the message.
        delivered: usize,
        /// Targets that did not.
        failed: usize,
    },
    /// The latest record matches the marker.
    Unchanged,
    /// The entity has no records yet.
    NoData,
    /// Processing failed (fetch, timeout or marker write); retried next tick.
    Skipped,
}

/// Counts of per-subscriber outcomes for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Enabled subscriptions in the tick's snapshot.
    pub attempted: usize,
    /// Subscribers whose baseline was established.
    pub baselined: usize,
    /// Subscribers notified about a new record.
    pub notified: usize,
    /// Subscribers with no new record.
    pub unchanged: usize,
    /// Subscribers whose entity has no records.
    pub no_data: usize,
    /// Subscribers skipped because of a failure.
    pub skipped: usize,
    /// Failed deliveries across all notified subscribers.
    pub failed_deliveries: usize,
}

impl TickReport {
    /// Adds one subscriber's outcome.
    pub const fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Baselined => self.baselined += 1,
            Outcome::Notified { failed, .. } => {
                self.notified += 1;
                self.failed_deliveries += failed;
            }
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::NoData => self.no_data += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} subscriptions: {} new, {} baseline, {} unchanged, {} empty, {} skipped",
            self.attempted, self.notified, self.baselined, self.unchanged, self.no_data, self.skipped
        )?;
        if self.failed_deliveries > 0 {
            write!(f, ", {} failed deliveries", self.failed_deliveries)?;
        }
        Ok(())
    }
}
