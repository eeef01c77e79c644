//! Rate controlled dispatch of workload messages.
//!
//! Two strategies issue the workload of a single phase:
//!
//! - [`IntervalTicker`]: one producer, one send per tick of `1 / rate`,
//!   meant for transports with their own async queue (message brokers);
//! - [`WorkerPool`]: a fixed amount of workers drawing from one shared
//!   constant rate [`pacer`], meant for request/response transports.
//!
//! Both report every attempted send as a [`Completion`] on the stream
//! returned by [`Dispatcher::start_phase`] and stop issuing once the
//! phase deadline passes, without waiting for in-flight sends.

use std::time::Duration;

use rama::{Service, error::BoxError, telemetry::tracing};
use tokio::{sync::mpsc, time::Instant};

use crate::{
    pace::PaceSpec,
    signal::{ControlMessage, MessageId},
};

mod payload;
#[doc(inline)]
pub use payload::MessageFactory;

pub mod pacer;

mod ticker;
#[doc(inline)]
pub use ticker::{DEFAULT_MAX_IN_FLIGHT, IntervalTicker};

mod pool;
#[doc(inline)]
pub use pool::WorkerPool;

/// Capacity of the completion stream of a phase.
pub const COMPLETION_BUFFER: usize = 1024;

/// Outcome of a single workload send.
#[derive(Debug)]
pub struct Completion {
    pub id: MessageId,
    /// Index of the phase the message was issued in.
    pub phase: usize,
    pub latency: Duration,
    pub result: Result<(), BoxError>,
}

impl Completion {
    #[inline(always)]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Wall-clock window of one phase.
#[derive(Debug, Clone, Copy)]
pub struct PhaseWindow {
    pub index: usize,
    pub spec: PaceSpec,
    pub started: Instant,
    pub deadline: Instant,
}

impl PhaseWindow {
    /// Window of phase `index` starting at `started`.
    pub fn new(index: usize, spec: PaceSpec, started: Instant) -> Self {
        Self {
            index,
            spec,
            started,
            deadline: started + spec.duration(),
        }
    }
}

/// Issues the workload of a phase.
pub trait Dispatcher: Send + Sync + 'static {
    /// Start issuing workload for `window`, returning the stream
    /// of completions. Issuing stops by itself at the window deadline,
    /// the stream closes once all issued sends have completed.
    fn start_phase(&self, window: PhaseWindow) -> mpsc::Receiver<Completion>;
}

/// Send `msg` over `transport`, timing the round trip.
async fn deliver<T>(transport: &T, phase: usize, msg: ControlMessage) -> Completion
where
    T: Service<ControlMessage, Output = (), Error = BoxError>,
{
    let id = msg.id;
    let start = Instant::now();
    let result = transport.serve(msg).await;
    let latency = start.elapsed();
    if let Err(err) = &result {
        tracing::debug!(%id, %phase, "workload send failed: {err}");
    }
    Completion {
        id,
        phase,
        latency,
        result,
    }
}

/// Interval between two sends at `rate` per second.
///
/// Rates beyond nanosecond resolution are clamped to a 1ns interval,
/// the fastest issue rate a timer can express.
pub fn tick_interval(rate: u32) -> Duration {
    let interval = Duration::from_secs_f64(1.0 / f64::from(rate.max(1)));
    if interval.is_zero() {
        tracing::debug!(%rate, "tick interval underflow: clamp to 1ns");
        Duration::from_nanos(1)
    } else {
        interval
    }
}
