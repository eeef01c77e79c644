//! Shared test doubles.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use rama::{Service, error::BoxError};

use crate::{
    collect::Collector,
    signal::{ControlMessage, EventKind},
};

/// Transport recording every message it is asked to send.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<ControlMessage>>,
    latency: Option<Duration>,
    fail: bool,
    stall: bool,
}

impl RecordingTransport {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Transport whose sends never complete.
    pub(crate) fn stalled() -> Self {
        Self {
            stall: true,
            ..Default::default()
        }
    }

    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Default::default()
        }
    }

    pub(crate) fn sequences(&self) -> Vec<u64> {
        self.sent
            .lock()
            .iter()
            .filter_map(ControlMessage::sequence)
            .collect()
    }

    pub(crate) fn kinds(&self) -> Vec<EventKind> {
        self.sent.lock().iter().map(|msg| msg.kind).collect()
    }
}

impl Service<ControlMessage> for RecordingTransport {
    type Output = ();
    type Error = BoxError;

    async fn serve(&self, msg: ControlMessage) -> Result<Self::Output, Self::Error> {
        self.sent.lock().push(msg);
        if self.stall {
            std::future::pending::<()>().await;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail {
            return Err(BoxError::from("recording transport: forced failure"));
        }
        Ok(())
    }
}

/// Collector counting how often it was asked to collect.
#[derive(Debug, Clone, Default)]
pub(crate) struct CountingCollector(Arc<AtomicUsize>);

impl CountingCollector {
    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Collector for CountingCollector {
    fn collect(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}
