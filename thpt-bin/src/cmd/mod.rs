use std::{path::PathBuf, sync::Arc, time::Duration};

use rama::{
    Service,
    error::BoxError,
    graceful::ShutdownGuard,
    net::socket::Interface,
    telemetry::tracing,
};

use clap::Args;
use eventing_thpt_lib::{
    collect::Collector,
    config::{SenderConfig, SenderConfigBuilder},
    dispatch::Dispatcher,
    metrics::SenderMetrics,
    schedule::{BenchmarkRun, RunReport, ScheduleConfig},
    signal::ControlMessage,
};

pub mod receive;
pub mod send;

#[cfg(feature = "kafka")]
pub mod kafka_send;

/// Arguments shared by all commands.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub data: PathBuf,
    pub metrics_bind: Interface,
}

/// Flags shared by all sending commands.
#[derive(Debug, Clone, Args)]
pub struct SenderArgs {
    /// comma separated phases as `rate[:seconds]`, e.g. `100,200:4`
    #[arg(long, value_name = "DESCRIPTOR")]
    pub pace: Option<String>,

    /// size in bytes of the random payload of each workload event (default: 100)
    #[arg(long = "msg-size", value_name = "BYTES")]
    pub msg_size: Option<usize>,

    /// source attribute of the emitted events
    #[arg(long)]
    pub source: Option<String>,

    /// delay before the first phase starts (default: 30s)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub warmup: Option<Duration>,

    /// pause after each phase, once the GC signal was sent (default: 1s)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub phase_pause: Option<Duration>,

    /// idle time after the end signal was sent (default: 2m)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub linger: Option<Duration>,
}

impl SenderArgs {
    pub fn config_builder(self) -> SenderConfigBuilder {
        SenderConfig::builder()
            .maybe_with_pace(self.pace)
            .maybe_with_message_size(self.msg_size)
            .maybe_with_source(self.source)
            .maybe_with_warmup(self.warmup)
            .maybe_with_phase_pause(self.phase_pause)
            .maybe_with_linger(self.linger)
    }
}

/// Run a full benchmark: warmup, all phases and the linger period.
///
/// Returns `None` when shutdown was requested before the run finished.
pub async fn run_benchmark<D, S, C>(
    guard: &ShutdownGuard,
    cfg: &SenderConfig,
    dispatcher: D,
    signals: Arc<S>,
    collector: C,
    metrics: SenderMetrics,
) -> Option<RunReport>
where
    D: Dispatcher,
    S: Service<ControlMessage, Output = (), Error = BoxError>,
    C: Collector,
{
    tracing::info!("warmup for {}", humantime::format_duration(cfg.warmup));
    if !sleep_unless_cancelled(guard, cfg.warmup).await {
        return None;
    }

    let run = BenchmarkRun::new(
        cfg.plan.clone(),
        dispatcher,
        signals,
        collector,
        metrics,
        ScheduleConfig {
            phase_pause: cfg.phase_pause,
            source: cfg.source.clone(),
        },
    );

    let report = tokio::select! {
        _ = guard.cancelled() => {
            tracing::warn!("benchmark run aborted: guard shutdown");
            return None;
        }
        report = run.run() => report,
    };

    tracing::info!(
        "benchmark done, linger for {}",
        humantime::format_duration(cfg.linger)
    );
    sleep_unless_cancelled(guard, cfg.linger).await;

    Some(report)
}

/// Sleep for `duration`, returning `false` if the guard got cancelled first.
pub async fn sleep_unless_cancelled(guard: &ShutdownGuard, duration: Duration) -> bool {
    tokio::select! {
        _ = guard.cancelled() => {
            tracing::debug!("sleep interrupted: guard shutdown");
            false
        }
        _ = tokio::time::sleep(duration) => true,
    }
}
