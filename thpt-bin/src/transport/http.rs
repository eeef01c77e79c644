use std::time::Duration;

use rama::{
    Layer as _, Service,
    error::{BoxError, ErrorContext as _},
    http::{
        BodyExtractExt as _, HeaderValue, Request, Response, Uri,
        client::EasyHttpWebClient,
        layer::required_header::AddRequiredRequestHeadersLayer,
    },
    layer::TimeoutLayer,
    rt::Executor,
    service::BoxService,
    telemetry::tracing,
};

use eventing_thpt_lib::{
    signal::{
        ControlMessage,
        http::{Encoding, encode_request},
    },
    utils::env::server_identifier,
};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers messages as CloudEvents over HTTP POST to a fixed target.
///
/// Any non 2xx response counts as a failed send.
pub struct HttpTransport {
    client: BoxService<Request, Response, BoxError>,
    target: Uri,
    encoding: Encoding,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("target", &self.target)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl HttpTransport {
    pub fn try_new(exec: Executor, target: Uri, encoding: Encoding) -> Result<Self, BoxError> {
        let inner_client = EasyHttpWebClient::connector_builder()
            .with_default_transport_connector()
            .without_tls_proxy_support()
            .without_proxy_support()
            .with_tls_support_using_boringssl(None)
            .with_default_http_connector(exec)
            .try_with_default_connection_pool()
            .context("create connection pool for http transport")?
            .build_client();

        let client = (
            TimeoutLayer::new(SEND_TIMEOUT),
            AddRequiredRequestHeadersLayer::new()
                .with_user_agent_header_value(HeaderValue::from_static(server_identifier())),
        )
            .into_layer(inner_client)
            .boxed();

        tracing::debug!(%target, %encoding, "http transport created");

        Ok(Self {
            client,
            target,
            encoding,
        })
    }
}

impl Service<ControlMessage> for HttpTransport {
    type Output = ();
    type Error = BoxError;

    async fn serve(&self, msg: ControlMessage) -> Result<Self::Output, Self::Error> {
        let req = encode_request(&msg, &self.target, self.encoding)?;
        let resp = self
            .client
            .serve(req)
            .await
            .context("send cloud event")
            .with_context_field("id", || msg.id.to_string())?;

        let status = resp.status();
        // drain the body so the connection can be reused
        let _ = resp.try_into_string().await;

        if !status.is_success() {
            return Err(BoxError::from("unexpected http status")
                .context_field("status", status.as_u16())
                .context_field("id", msg.id.to_string()));
        }
        Ok(())
    }
}
