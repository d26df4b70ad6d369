//! Retention check for resume ticks.

use tidings_core::{secs_to_ticks, FeedError, FeedResult, Tick};

/// Rejects reads that start further back than the retention window.
///
/// A window exactly `max_age_secs` old is still served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeGate {
    max_age_secs: u64,
}

impl AgeGate {
    pub fn new(max_age_secs: u64) -> Self {
        Self { max_age_secs }
    }

    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    /// Fail with [`FeedError::Expired`] when `now - since` exceeds the window.
    pub fn check(&self, since: Tick, now: Tick) -> FeedResult<()> {
        if now.saturating_sub(since) > secs_to_ticks(self.max_age_secs) {
            return Err(FeedError::Expired {
                since,
                now,
                max_age_secs: self.max_age_secs,
            });
        }
        Ok(())
    }
}
