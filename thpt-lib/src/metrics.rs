//! Monotonic counters exposed for external scraping.
//!
//! The core only ever increments these, reading them is left
//! to whoever scrapes the [`Registry`].

use prometheus::{Encoder as _, IntCounter, Registry, TextEncoder};
use rama::error::{BoxError, ErrorContext as _};

pub const METRIC_SENT_TOTAL: &str = "sent_total";
pub const METRIC_SEND_FAILURES_TOTAL: &str = "send_failures_total";
pub const METRIC_RECEIVED_TOTAL: &str = "received_total";

/// Counters of the sending side.
#[derive(Debug, Clone)]
pub struct SenderMetrics {
    /// Acknowledged workload messages.
    pub sent: IntCounter,
    /// Workload messages which failed at the transport.
    pub failed: IntCounter,
}

impl SenderMetrics {
    pub fn new() -> Result<Self, BoxError> {
        Ok(Self {
            sent: IntCounter::new(METRIC_SENT_TOTAL, "Total number of events sent")
                .context("create sent counter")?,
            failed: IntCounter::new(
                METRIC_SEND_FAILURES_TOTAL,
                "Total number of events which failed to be sent",
            )
            .context("create send failure counter")?,
        })
    }

    /// Create the counters and register them into `registry`.
    pub fn try_register(registry: &Registry) -> Result<Self, BoxError> {
        let metrics = Self::new()?;
        registry
            .register(Box::new(metrics.sent.clone()))
            .context("register sent counter")?;
        registry
            .register(Box::new(metrics.failed.clone()))
            .context("register send failure counter")?;
        Ok(metrics)
    }
}

/// Counters of the receiving side.
#[derive(Debug, Clone)]
pub struct ReceiverMetrics {
    /// Every accepted event, control signals included.
    pub received: IntCounter,
}

impl ReceiverMetrics {
    pub fn new() -> Result<Self, BoxError> {
        Ok(Self {
            received: IntCounter::new(METRIC_RECEIVED_TOTAL, "Total number of events received")
                .context("create received counter")?,
        })
    }

    pub fn try_register(registry: &Registry) -> Result<Self, BoxError> {
        let metrics = Self::new()?;
        registry
            .register(Box::new(metrics.received.clone()))
            .context("register received counter")?;
        Ok(metrics)
    }
}

/// Render all metrics of `registry` in the prometheus text format.
pub fn encode_text(registry: &Registry) -> Result<String, BoxError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .context("encode metric families")?;
    String::from_utf8(buffer).context("metric families as utf-8 text")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_registered_counters() {
        let registry = Registry::new();
        let sender = SenderMetrics::try_register(&registry).unwrap();
        let receiver = ReceiverMetrics::try_register(&registry).unwrap();

        sender.sent.inc_by(3);
        sender.failed.inc();
        receiver.received.inc_by(4);

        let text = encode_text(&registry).unwrap();
        assert!(text.contains("sent_total 3"), "{text}");
        assert!(text.contains("send_failures_total 1"), "{text}");
        assert!(text.contains("received_total 4"), "{text}");
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        SenderMetrics::try_register(&registry).unwrap();
        assert!(SenderMetrics::try_register(&registry).is_err());
    }
}
