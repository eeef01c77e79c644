use std::sync::Arc;

use futures::{StreamExt as _, stream::FuturesUnordered};
use rama::{Service, error::BoxError, rt::Executor, telemetry::tracing};
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};

use super::{
    COMPLETION_BUFFER, Completion, Dispatcher, MessageFactory, PhaseWindow, deliver,
    tick_interval,
};
use crate::signal::ControlMessage;

/// Default upper bound of sends awaiting their result at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4096;

/// Single producer firing one send per tick of `1 / rate`.
///
/// Sends are handed to the transport from the producer task itself,
/// in issue order, and their results awaited concurrently. While
/// `max_in_flight` sends are outstanding no new message is created,
/// missed ticks are fired as a burst once a slot frees up.
///
/// When the deadline and a tick are ready at the same moment
/// the deadline wins and no send is fired.
pub struct IntervalTicker<T> {
    exec: Executor,
    transport: Arc<T>,
    factory: Arc<MessageFactory>,
    max_in_flight: usize,
}

impl<T> std::fmt::Debug for IntervalTicker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalTicker")
            .field("factory", &self.factory)
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

impl<T> IntervalTicker<T> {
    pub fn new(exec: Executor, transport: Arc<T>, factory: Arc<MessageFactory>) -> Self {
        Self {
            exec,
            transport,
            factory,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Limit the amount of sends awaiting their result at once (min 1).
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }
}

impl<T> Dispatcher for IntervalTicker<T>
where
    T: Service<ControlMessage, Output = (), Error = BoxError>,
{
    fn start_phase(&self, window: PhaseWindow) -> mpsc::Receiver<Completion> {
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_BUFFER);

        let transport = self.transport.clone();
        let factory = self.factory.clone();
        let max_in_flight = self.max_in_flight;

        self.exec.spawn_task(async move {
            let period = tick_interval(window.spec.rate().get());
            let mut ticker = time::interval_at(window.started, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

            let deadline = time::sleep_until(window.deadline);
            let mut deadline = std::pin::pin!(deadline);

            // polled in push order, so the transport sees ids in issue order
            let mut in_flight = FuturesUnordered::new();

            let mut ticks: u64 = 0;
            loop {
                tokio::select! {
                    biased;

                    _ = deadline.as_mut() => break,
                    Some(completion) = in_flight.next(), if !in_flight.is_empty() => {
                        if completion_tx.send(completion).await.is_err() {
                            tracing::trace!("completion dropped: phase stream closed");
                        }
                    }
                    _ = ticker.tick(), if in_flight.len() < max_in_flight => {
                        ticks += 1;
                        let msg = factory.next_workload();
                        in_flight.push(deliver(&*transport, window.index, msg));
                    }
                }
            }

            tracing::debug!(
                phase = window.index,
                %ticks,
                ?period,
                in_flight = in_flight.len(),
                "interval ticker: phase deadline reached",
            );

            loop {
                tokio::select! {
                    _ = completion_tx.closed() => {
                        tracing::debug!(
                            phase = window.index,
                            abandoned = in_flight.len(),
                            "interval ticker: phase stream closed, abandon in-flight sends",
                        );
                        break;
                    }
                    maybe_completion = in_flight.next() => {
                        let Some(completion) = maybe_completion else {
                            break;
                        };
                        if completion_tx.send(completion).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        completion_rx
    }
}
