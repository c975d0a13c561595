//! Timed re-checks while a workload cluster removes its Verrazzano resource
//!
//! Instead of sleeping, a binding pass returns a requeue with a jittered delay.
//! The total wait is budgeted from the binding's deletion timestamp.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Next step while waiting for remote deletion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletionWait {
    /// Check again after this delay
    Recheck(Duration),
    /// The budget is spent
    Expired,
}

/// Wait bounds and budget
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeletionWaitPolicy {
    pub timeout: Duration,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl DeletionWaitPolicy {
    /// A random delay in `[min_wait, max_wait]`
    pub fn jitter(&self) -> Duration {
        let (low, high) = if self.min_wait <= self.max_wait {
            (self.min_wait, self.max_wait)
        } else {
            (self.max_wait, self.min_wait)
        };
        rand::rng().random_range(low..=high)
    }

    /// Decide the next step given when deletion started.
    ///
    /// `delay` is clamped so the final re-check lands at the end of the budget.
    pub fn next(
        &self,
        deleted_at: DateTime<Utc>,
        now: DateTime<Utc>,
        delay: Duration,
    ) -> DeletionWait {
        let elapsed = (now - deleted_at).to_std().unwrap_or(Duration::ZERO);
        match self.timeout.checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => DeletionWait::Recheck(delay.min(remaining)),
            _ => DeletionWait::Expired,
        }
    }
}
