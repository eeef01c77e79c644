//! Receiving side classification of inbound events.
//!
//! The receiver has no schedule of its own, it only reacts to the type
//! attribute of what arrives:
//!
//! - every event is counted, control signals included;
//! - a GC signal runs the [`Collector`] before it is acknowledged;
//! - an end signal moves the receiver into [`ReceiverState::Terminating`].

use prometheus::IntCounter;
use rama::telemetry::tracing;
use tokio::sync::watch;

use crate::{
    collect::Collector,
    metrics::ReceiverMetrics,
    signal::{EventKind, TypeAttr},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    #[default]
    Listening,
    Terminating,
}

/// Classifies inbound events and applies their side effects.
pub struct Classifier<C> {
    received: IntCounter,
    collector: C,
    state: watch::Sender<ReceiverState>,
}

impl<C> std::fmt::Debug for Classifier<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("received", &self.received.get())
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl<C: Collector> Classifier<C> {
    pub fn new(metrics: ReceiverMetrics, collector: C) -> Self {
        Self {
            received: metrics.received,
            collector,
            state: watch::Sender::new(ReceiverState::Listening),
        }
    }

    /// Classify an event by its type attribute and apply its side effects.
    ///
    /// Never fails: an unrecognized or missing type counts as workload.
    pub fn classify(&self, type_attr: TypeAttr<'_>) -> EventKind {
        self.received.inc();

        match type_attr {
            TypeAttr::Known(EventKind::Workload) => (),
            TypeAttr::Known(EventKind::GcSignal) => {
                tracing::debug!("gc signal received: collect");
                self.collector.collect();
            }
            TypeAttr::Known(EventKind::EndSignal) => {
                let first = self.state.send_if_modified(|state| {
                    let modified = *state != ReceiverState::Terminating;
                    *state = ReceiverState::Terminating;
                    modified
                });
                if first {
                    tracing::info!(
                        received = self.received.get(),
                        "end signal received: terminating",
                    );
                } else {
                    tracing::debug!("duplicate end signal received: already terminating");
                }
            }
            TypeAttr::Unrecognized(value) => {
                tracing::debug!(type_attr = %value, "unrecognized event type: count as workload");
            }
            TypeAttr::Missing => {
                tracing::trace!("event without type attribute: count as workload");
            }
        }

        type_attr.kind()
    }

    pub fn state(&self) -> ReceiverState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReceiverState> {
        self.state.subscribe()
    }

    /// Total amount of events received so far.
    pub fn received(&self) -> u64 {
        self.received.get()
    }

    /// Resolves once an end signal was classified.
    pub async fn terminated(&self) {
        let mut state_rx = self.state.subscribe();
        // cannot fail, the sender is owned by self
        let _ = state_rx
            .wait_for(|state| *state == ReceiverState::Terminating)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::test::CountingCollector;

    fn classifier() -> (Arc<Classifier<CountingCollector>>, CountingCollector) {
        let collector = CountingCollector::default();
        let classifier = Classifier::new(ReceiverMetrics::new().unwrap(), collector.clone());
        (Arc::new(classifier), collector)
    }

    #[test]
    fn test_classify_workload_only_counts() {
        let (classifier, collector) = classifier();
        for _ in 0..3 {
            assert_eq!(
                classifier.classify(TypeAttr::Known(EventKind::Workload)),
                EventKind::Workload
            );
        }
        assert_eq!(classifier.received(), 3);
        assert_eq!(collector.count(), 0);
        assert_eq!(classifier.state(), ReceiverState::Listening);
    }

    #[test]
    fn test_classify_gc_signal_collects_once() {
        let (classifier, collector) = classifier();
        assert_eq!(
            classifier.classify(TypeAttr::Known(EventKind::GcSignal)),
            EventKind::GcSignal
        );
        assert_eq!(collector.count(), 1);
        assert_eq!(classifier.received(), 1);
        assert_eq!(classifier.state(), ReceiverState::Listening);
    }

    #[traced_test]
    #[test]
    fn test_classify_unknown_type_counts_as_workload() {
        let (classifier, collector) = classifier();
        assert_eq!(
            classifier.classify(TypeAttr::parse(Some("dev.example.other"))),
            EventKind::Workload
        );
        assert_eq!(classifier.classify(TypeAttr::Missing), EventKind::Workload);
        assert_eq!(classifier.received(), 2);
        assert_eq!(collector.count(), 0);
        assert!(logs_contain("dev.example.other"));
    }

    #[tokio::test]
    async fn test_classify_end_signal_terminates() {
        let (classifier, _) = classifier();

        let waiter = tokio::spawn({
            let classifier = classifier.clone();
            async move { classifier.terminated().await }
        });

        classifier.classify(TypeAttr::Known(EventKind::Workload));
        assert!(!waiter.is_finished());

        assert_eq!(
            classifier.classify(TypeAttr::Known(EventKind::EndSignal)),
            EventKind::EndSignal
        );
        waiter.await.unwrap();

        assert_eq!(classifier.state(), ReceiverState::Terminating);
        assert_eq!(classifier.received(), 2);

        // later events are still counted, the state stays terminal
        classifier.classify(TypeAttr::Known(EventKind::EndSignal));
        assert_eq!(classifier.received(), 3);
        assert_eq!(classifier.state(), ReceiverState::Terminating);
    }
}
