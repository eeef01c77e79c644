//! Phase scheduling of a benchmark run.
//!
//! A [`BenchmarkRun`] walks the phases of a [`PacePlan`] strictly in
//! order. Each phase lasts exactly its configured wall-clock duration,
//! regardless of how much of its workload was acknowledged. Between
//! phases a GC signal is emitted, the local collector runs and the run
//! pauses briefly. After the last phase a single end signal is emitted.

use std::{sync::Arc, time::Duration};

use rama::{
    Service,
    error::BoxError,
    telemetry::tracing::{self, Instrument as _},
};
use tokio::{
    sync::watch,
    time::{self, Instant},
};

use crate::{
    collect::Collector,
    dispatch::{Dispatcher, PhaseWindow},
    metrics::SenderMetrics,
    pace::{PacePlan, PaceSpec},
    signal::{ControlMessage, EventKind},
};


/// Sender side state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    #[default]
    Idle,
    Running {
        phase: usize,
    },
    /// All phases done, in-flight work is given time to settle.
    Draining,
    EndSent,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Pause after each phase, once the GC signal was sent.
    pub phase_pause: Duration,
    /// Source attribute of emitted control signals.
    pub source: Arc<str>,
}

#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub index: usize,
    pub spec: PaceSpec,
    /// Workload sends acknowledged before the phase deadline.
    pub acknowledged: u64,
    /// Workload sends which failed before the phase deadline.
    pub failed: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub phases: Vec<PhaseReport>,
    pub end_signal_delivered: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn acknowledged(&self) -> u64 {
        self.phases.iter().map(|phase| phase.acknowledged).sum()
    }

    pub fn failed(&self) -> u64 {
        self.phases.iter().map(|phase| phase.failed).sum()
    }
}

/// A single benchmark run, consumed by [`BenchmarkRun::run`].
pub struct BenchmarkRun<D, S, C> {
    plan: PacePlan,
    dispatcher: D,
    signals: Arc<S>,
    collector: C,
    metrics: SenderMetrics,
    config: ScheduleConfig,
    state: watch::Sender<SenderState>,
    signal_seq: u32,
}

impl<D, S, C> std::fmt::Debug for BenchmarkRun<D, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkRun")
            .field("plan", &self.plan)
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl<D, S, C> BenchmarkRun<D, S, C>
where
    D: Dispatcher,
    S: Service<ControlMessage, Output = (), Error = BoxError>,
    C: Collector,
{
    pub fn new(
        plan: PacePlan,
        dispatcher: D,
        signals: Arc<S>,
        collector: C,
        metrics: SenderMetrics,
        config: ScheduleConfig,
    ) -> Self {
        Self {
            plan,
            dispatcher,
            signals,
            collector,
            metrics,
            config,
            state: watch::Sender::new(SenderState::Idle),
            signal_seq: 0,
        }
    }

    /// Observe the state of this run.
    pub fn subscribe(&self) -> watch::Receiver<SenderState> {
        self.state.subscribe()
    }

    /// Run all phases followed by the end signal.
    pub async fn run(mut self) -> RunReport {
        let span = tracing::info_span!("benchmark_run", plan = %self.plan);
        async move {
            let run_start = Instant::now();
            let specs = self.plan.phases().to_vec();
            let last = specs.len() - 1;
            let mut phases = Vec::with_capacity(specs.len());

            tracing::info!(
                phases = specs.len(),
                duration = %humantime::format_duration(self.plan.total_duration()),
                "benchmark run started",
            );

            for (index, spec) in specs.into_iter().enumerate() {
                self.state.send_replace(SenderState::Running { phase: index });
                tracing::info!(phase = index, "start phase: {spec}");

                let window = PhaseWindow::new(index, spec, Instant::now());
                let report = run_phase(&self.dispatcher, window, &self.metrics).await;

                tracing::info!(
                    phase = index,
                    acknowledged = report.acknowledged,
                    failed = report.failed,
                    expected = spec.expected_requests(),
                    "phase done in {:?}",
                    report.elapsed,
                );
                phases.push(report);

                if index == last {
                    self.state.send_replace(SenderState::Draining);
                }

                self.send_signal(EventKind::GcSignal).await;
                self.collector.collect();
                time::sleep(self.config.phase_pause).await;
            }

            let end_signal_delivered = self.send_signal(EventKind::EndSignal).await;
            self.state.send_replace(SenderState::EndSent);

            let report = RunReport {
                phases,
                end_signal_delivered,
                elapsed: run_start.elapsed(),
            };
            tracing::info!(
                acknowledged = report.acknowledged(),
                failed = report.failed(),
                end_signal_delivered,
                "benchmark run finished in {:?}",
                report.elapsed,
            );

            self.state.send_replace(SenderState::Idle);
            report
        }
        .instrument(span)
        .await
    }

    async fn send_signal(&mut self, kind: EventKind) -> bool {
        let msg = ControlMessage::signal(self.signal_seq, kind, self.config.source.clone());
        self.signal_seq += 1;

        let id = msg.id;
        match self.signals.serve(msg).await {
            Ok(()) => {
                tracing::info!(%id, "{kind} signal sent");
                true
            }
            Err(err) => {
                tracing::warn!(%id, "failed to send {kind} signal: {err}");
                false
            }
        }
    }
}

/// Run a single phase: start the dispatcher and consume its completions
/// until the window deadline, counting them into `metrics`.
///
/// Always returns at the deadline, even when the dispatcher finished
/// early or sends are still in flight.
pub async fn run_phase<D: Dispatcher>(
    dispatcher: &D,
    window: PhaseWindow,
    metrics: &SenderMetrics,
) -> PhaseReport {
    let mut completions = dispatcher.start_phase(window);
    let mut deadline = std::pin::pin!(time::sleep_until(window.deadline));

    let mut acknowledged = 0;
    let mut failed = 0;

    loop {
        tokio::select! {
            biased;

            _ = deadline.as_mut() => break,
            maybe_completion = completions.recv() => {
                let Some(completion) = maybe_completion else {
                    tracing::debug!(
                        phase = window.index,
                        "completion stream closed before deadline",
                    );
                    deadline.as_mut().await;
                    break;
                };
                if completion.is_ok() {
                    acknowledged += 1;
                    metrics.sent.inc();
                } else {
                    failed += 1;
                    metrics.failed.inc();
                }
            }
        }
    }

    PhaseReport {
        index: window.index,
        spec: window.spec,
        acknowledged,
        failed,
        elapsed: window.started.elapsed(),
    }
}
