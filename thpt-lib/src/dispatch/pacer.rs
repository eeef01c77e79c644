use std::{num::NonZeroU32, time::Duration};

use tokio::time::{Instant, sleep_until};

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// Constant rate pacer.
///
/// Hit `n` is due at `started + n / rate`, measured on the wall clock
/// rather than relative to the previous hit. A caller which falls behind
/// gets the overdue hits immediately, so the long term rate converges
/// to the configured one. The first hit is due at `started`.
#[derive(Debug)]
pub struct ConstantPacer {
    rate: NonZeroU32,
    started: Instant,
    hits: u64,
}

impl ConstantPacer {
    pub fn new(rate: NonZeroU32, started: Instant) -> Self {
        Self {
            rate,
            started,
            hits: 0,
        }
    }

    /// Moment at which the next hit is due.
    pub fn next_due(&self) -> Instant {
        let nanos = u128::from(self.hits) * 1_000_000_000 / u128::from(self.rate.get());
        let offset = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
        self.started
            .checked_add(offset)
            .unwrap_or_else(|| self.started + FAR_FUTURE)
    }

    /// Wait until the next hit is due and consume it,
    /// returning the moment it was due.
    pub async fn wait_one(&mut self) -> Instant {
        let due = self.next_due();
        sleep_until(due).await;
        self.hits += 1;
        due
    }

    /// Amount of hits consumed so far.
    pub fn hits(&self) -> u64 {
        self.hits
    }
}
