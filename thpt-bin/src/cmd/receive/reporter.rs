use std::{num::NonZeroU32, sync::Arc, time::Duration};

use rama::{graceful::ShutdownGuard, telemetry::tracing};
use tokio::time::{self, Instant, MissedTickBehavior};

use eventing_thpt_lib::{collect::Collector, receiver::Classifier};

pub(super) const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Turns the monotonic received counter into a per interval arrival rate.
#[derive(Debug)]
pub(super) struct RateReporter {
    max_expected: NonZeroU32,
    last_total: u64,
    peak_rate: f64,
}

impl RateReporter {
    pub(super) fn new(max_expected: NonZeroU32) -> Self {
        Self {
            max_expected,
            last_total: 0,
            peak_rate: 0.,
        }
    }

    /// Report the rate observed since the previous tick, returning it.
    pub(super) fn on_tick(&mut self, total: u64, elapsed: Duration) -> f64 {
        let delta = total.saturating_sub(self.last_total);
        self.last_total = total;

        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0. { delta as f64 / secs } else { 0. };

        if delta == 0 {
            tracing::trace!(total, "no events received");
            return rate;
        }

        self.peak_rate = self.peak_rate.max(rate);
        if rate > f64::from(self.max_expected.get()) {
            tracing::warn!(
                total,
                max_expected = self.max_expected.get(),
                "arrival rate above expected maximum: {rate:.1} rps",
            );
        } else {
            tracing::info!(total, "arrival rate: {rate:.1} rps");
        }
        rate
    }

    pub(super) fn finish(&self, total: u64) {
        tracing::info!(
            total,
            peak_rate = format!("{:.1}", self.peak_rate),
            "receiver rate reporter done",
        );
    }
}

pub(super) async fn report_worker<C: Collector>(
    guard: ShutdownGuard,
    classifier: Arc<Classifier<C>>,
    max_expected: NonZeroU32,
) {
    let mut reporter = RateReporter::new(max_expected);

    let mut interval = time::interval(REPORT_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            _ = guard.cancelled() => {
                tracing::debug!("exit rate reporter: guard shutdown");
                break;
            }
            now = interval.tick() => {
                reporter.on_tick(classifier.received(), now.duration_since(last_tick));
                last_tick = now;
            }
        }
    }

    reporter.finish(classifier.received());
}
