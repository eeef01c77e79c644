use std::{sync::Arc, time::Duration};

use rama::{
    Layer as _,
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    http::{
        HeaderValue,
        layer::{required_header::AddRequiredResponseHeadersLayer, trace::TraceLayer},
        server::HttpServer,
    },
    layer::TimeoutLayer,
    net::{address::SocketAddress, socket::Interface},
    rt::Executor,
    tcp::server::TcpListener,
    telemetry::tracing::{self, Instrument as _},
};

use clap::Args;
use eventing_thpt_lib::{
    config::ReceiverConfig, metrics::ReceiverMetrics, receiver::Classifier,
    utils::env::server_identifier,
};
use prometheus::Registry;

use crate::{memory::AllocatorCollector, server};

use super::{GlobalArgs, sleep_unless_cancelled};

mod reporter;
mod service;

#[derive(Debug, Clone, Args)]
/// receive and count cloud events over HTTP
pub struct ReceiveCommand {
    /// network interface to bind the event receiver to
    #[arg(
        long,
        short = 'b',
        value_name = "INTERFACE",
        default_value = "0.0.0.0:8080"
    )]
    bind: Interface,

    /// arrival rate (events per second) above which a warning is logged
    #[arg(long, value_name = "RPS", allow_negative_numbers = true)]
    max_throughput_expected: i64,

    /// time to keep serving after the end signal arrived (default: 2m)
    #[arg(long, value_parser = humantime::parse_duration)]
    grace: Option<Duration>,

    /// ignore the end signal and keep receiving until interrupted
    #[arg(long, default_value_t = false)]
    keep_running: bool,
}

pub async fn exec(
    global: GlobalArgs,
    guard: ShutdownGuard,
    args: ReceiveCommand,
) -> Result<(), BoxError> {
    let cfg = ReceiverConfig::try_new(
        args.max_throughput_expected,
        args.grace,
        !args.keep_running,
    )?;

    tracing::info!(
        max_throughput_expected = cfg.max_throughput_expected.get(),
        grace = %humantime::format_duration(cfg.grace),
        stop_on_end = cfg.stop_on_end,
        "receiver config ready",
    );

    let registry = Registry::new();
    let metrics = ReceiverMetrics::try_register(&registry)?;
    let classifier = Arc::new(Classifier::new(metrics, AllocatorCollector));

    let exec = Executor::graceful(guard.clone());
    server::metrics::spawn_metrics_server(
        exec.clone(),
        global.metrics_bind,
        &global.data,
        "receiver.metrics",
        registry,
    )
    .await?;

    let http_svc = (
        TraceLayer::new_for_http(),
        AddRequiredResponseHeadersLayer::new()
            .with_server_header_value(HeaderValue::from_static(server_identifier())),
    )
        .into_layer(service::ReceiverService::new(classifier.clone()));

    let http_server = HttpServer::auto(exec.clone()).service(Arc::new(http_svc));
    let tcp_svc = TimeoutLayer::new(Duration::from_secs(60)).into_layer(http_server);

    let tcp_listener = TcpListener::bind(args.bind, exec.clone())
        .await
        .context("bind event receiver http server")?;

    let receiver_addr: SocketAddress = tcp_listener
        .local_addr()
        .context("get bound address for event receiver http server")?
        .into();

    tracing::info!("event receiver bound to: {receiver_addr}");
    server::write_server_socket_address_as_file(&global.data, "receiver", receiver_addr).await?;

    exec.spawn_task(
        tcp_listener
            .serve(tcp_svc)
            .instrument(tracing::info_span!("event_receiver", %receiver_addr)),
    );

    guard.spawn_task_fn({
        let classifier = classifier.clone();
        let max_expected = cfg.max_throughput_expected;
        move |guard| reporter::report_worker(guard, classifier, max_expected)
    });

    if !cfg.stop_on_end {
        guard.cancelled().await;
        return Ok(());
    }

    tokio::select! {
        _ = guard.cancelled() => return Ok(()),
        _ = classifier.terminated() => (),
    }

    tracing::info!(
        received = classifier.received(),
        "end of benchmark: shutdown in {}",
        humantime::format_duration(cfg.grace),
    );
    sleep_unless_cancelled(&guard, cfg.grace).await;

    Ok(())
}
