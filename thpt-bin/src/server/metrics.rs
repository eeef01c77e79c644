use std::{path::Path, sync::Arc, time::Duration};

use rama::{
    Layer as _,
    error::{BoxError, ErrorContext as _},
    http::{
        HeaderValue, StatusCode,
        layer::{required_header::AddRequiredResponseHeadersLayer, trace::TraceLayer},
        server::HttpServer,
        service::web::{Router, response::IntoResponse},
    },
    layer::TimeoutLayer,
    net::{address::SocketAddress, socket::Interface},
    rt::Executor,
    tcp::server::TcpListener,
    telemetry::tracing::{self, Instrument as _},
};

use eventing_thpt_lib::{metrics::encode_text, utils::env::server_identifier};
use prometheus::Registry;

/// Bind the metrics server and serve the counters of `registry`
/// in the prometheus text format on `/metrics` in the background.
///
/// The bound address is written as `{name}.addr.txt` into `data`.
pub async fn spawn_metrics_server(
    exec: Executor,
    bind: Interface,
    data: &Path,
    name: &str,
    registry: Registry,
) -> Result<SocketAddress, BoxError> {
    let http_router = Router::new()
        .with_get("/ping", "pong")
        .with_get("/metrics", move || {
            let response = match encode_text(&registry) {
                Ok(text) => text.into_response(),
                Err(err) => {
                    tracing::error!("failed to encode metrics: {err}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            };
            std::future::ready(response)
        });

    let http_svc = (
        TraceLayer::new_for_http(),
        AddRequiredResponseHeadersLayer::new()
            .with_server_header_value(HeaderValue::from_static(server_identifier())),
    )
        .into_layer(http_router);

    let http_server = HttpServer::auto(exec.clone()).service(Arc::new(http_svc));
    let tcp_svc = TimeoutLayer::new(Duration::from_secs(60)).into_layer(http_server);

    let tcp_listener = TcpListener::bind(bind, exec.clone())
        .await
        .context("bind metrics http server")?;

    let metrics_addr: SocketAddress = tcp_listener
        .local_addr()
        .context("get bound address for metrics http server")?
        .into();

    tracing::info!("metrics http server bound to: {metrics_addr}");
    super::write_server_socket_address_as_file(data, name, metrics_addr).await?;

    exec.spawn_task(
        tcp_listener
            .serve(tcp_svc)
            .instrument(tracing::debug_span!("metrics_server", %metrics_addr)),
    );

    Ok(metrics_addr)
}
