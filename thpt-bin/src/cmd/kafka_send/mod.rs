use std::sync::Arc;

use rama::{
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    rt::Executor,
    telemetry::tracing,
};

use clap::Args;
use eventing_thpt_lib::{
    dispatch::{IntervalTicker, MessageFactory},
    metrics::SenderMetrics,
};
use prometheus::Registry;

use crate::{
    memory::AllocatorCollector, server::metrics::spawn_metrics_server,
    transport::KafkaTransport,
};

use super::{GlobalArgs, SenderArgs, run_benchmark};

#[derive(Debug, Clone, Args)]
/// produce paced cloud events onto a kafka topic
pub struct KafkaSendCommand {
    /// comma separated list of kafka brokers
    #[arg(long, value_name = "HOST:PORT", default_value = "localhost:9092")]
    bootstrap_server: String,

    /// topic the events are produced to
    #[arg(long)]
    topic: String,

    #[clap(flatten)]
    sender: SenderArgs,
}

pub async fn exec(
    global: GlobalArgs,
    guard: ShutdownGuard,
    args: KafkaSendCommand,
) -> Result<(), BoxError> {
    // the producer has its own async queue, a single ticker is enough
    let cfg = args.sender.config_builder().build()?;

    tracing::info!(
        bootstrap_server = %args.bootstrap_server,
        topic = %args.topic,
        plan = %cfg.plan,
        message_size = cfg.message_size,
        source = %cfg.source,
        "kafka sender config ready",
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
        KafkaTransport::try_new(
            &args.bootstrap_server,
            args.topic,
            cfg.plan.max_phase_requests(),
        )
        .context("create kafka transport")?,
    );
    let factory = Arc::new(MessageFactory::new(cfg.source.clone(), cfg.message_size));
    let dispatcher = IntervalTicker::new(exec, transport.clone(), factory);

    if let Some(report) = run_benchmark(
        &guard,
        &cfg,
        dispatcher,
        transport,
        AllocatorCollector,
        metrics,
    )
    .await
    {
        tracing::info!(
            acknowledged = report.acknowledged(),
            failed = report.failed(),
            end_signal_delivered = report.end_signal_delivered,
            "kafka sender finished",
        );
    }

    Ok(())
}
