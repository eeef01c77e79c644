use std::sync::Arc;

use rama::{
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    http::Uri,
    rt::Executor,
    telemetry::tracing,
};

use clap::Args;
use eventing_thpt_lib::{
    config::{ConfigError, DispatchStrategy},
    dispatch::{IntervalTicker, MessageFactory, WorkerPool},
    metrics::SenderMetrics,
    signal::http::Encoding,
};
use prometheus::Registry;

use crate::{
    memory::AllocatorCollector, server::metrics::spawn_metrics_server, transport::HttpTransport,
};

use super::{GlobalArgs, SenderArgs, run_benchmark};

/// Environment variable which, when set, overrides `--sink`.
pub const ENV_SINK: &str = "SINK";

#[derive(Debug, Clone, Args)]
/// send paced cloud events over HTTP to a sink
pub struct SendCommand {
    /// URL the events are POSTed to, overridden by the `SINK` env variable
    #[arg(long, value_name = "URL")]
    sink: Option<Uri>,

    /// amount of concurrent workers sharing the pace of a phase
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// cloud events http mode: binary or structured
    #[arg(long, default_value_t = Encoding::Binary)]
    encoding: Encoding,

    #[clap(flatten)]
    sender: SenderArgs,
}

pub async fn exec(
    global: GlobalArgs,
    guard: ShutdownGuard,
    args: SendCommand,
) -> Result<(), BoxError> {
    let sink = resolve_sink(args.sink, std::env::var(ENV_SINK).ok())?;
    let cfg = args
        .sender
        .config_builder()
        .with_workers(args.workers)
        .build()?;

    tracing::info!(
        %sink,
        encoding = %args.encoding,
        plan = %cfg.plan,
        strategy = %cfg.strategy,
        message_size = cfg.message_size,
        source = %cfg.source,
        "sender config ready",
    );

    let registry = Registry::new();
    let metrics = SenderMetrics::try_register(&registry)?;

    let exec = Executor::graceful(guard.clone());
    spawn_metrics_server(
        exec.clone(),
        global.metrics_bind,
        &global.data,
        "sender.metrics",
        registry,
    )
    .await?;

    let transport = Arc::new(
        HttpTransport::try_new(exec.clone(), sink, args.encoding)
            .context("create http transport")?,
    );
    let factory = Arc::new(MessageFactory::new(cfg.source.clone(), cfg.message_size));

    let report = match cfg.strategy {
        DispatchStrategy::Ticker => {
            let dispatcher = IntervalTicker::new(exec, transport.clone(), factory);
            run_benchmark(&guard, &cfg, dispatcher, transport, AllocatorCollector, metrics).await
        }
        DispatchStrategy::Pool { workers } => {
            let dispatcher = WorkerPool::new(exec, transport.clone(), factory, workers);
            run_benchmark(&guard, &cfg, dispatcher, transport, AllocatorCollector, metrics).await
        }
    };

    if let Some(report) = report {
        tracing::info!(
            acknowledged = report.acknowledged(),
            failed = report.failed(),
            end_signal_delivered = report.end_signal_delivered,
            "sender finished",
        );
    }

    Ok(())
}

/// Pick the sink: a non-empty `SINK` env value wins over the flag.
fn resolve_sink(flag: Option<Uri>, env: Option<String>) -> Result<Uri, BoxError> {
    match env.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse()
            .context("parse sink url from env")
            .with_context_field("value", || raw.to_owned()),
        None => flag.ok_or_else(|| ConfigError::MissingSink.into()),
    }
}
