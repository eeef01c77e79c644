use std::{convert::Infallible, sync::Arc};

use rama::{
    Service,
    http::{Request, Response, StatusCode, service::web::response::IntoResponse},
    telemetry::tracing,
};

use eventing_thpt_lib::{
    collect::Collector,
    receiver::Classifier,
    signal::{TypeAttr, http::decode_request},
};

/// Accepts any inbound cloud event, classifies it and answers `200 OK`.
pub(super) struct ReceiverService<C> {
    classifier: Arc<Classifier<C>>,
}

impl<C> ReceiverService<C> {
    pub(super) fn new(classifier: Arc<Classifier<C>>) -> Self {
        Self { classifier }
    }
}

impl<C> std::fmt::Debug for ReceiverService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverService")
            .field("classifier", &self.classifier)
            .finish()
    }
}

impl<C: Collector> Service<Request> for ReceiverService<C> {
    type Output = Response;
    type Error = Infallible;

    async fn serve(&self, req: Request) -> Result<Self::Output, Self::Error> {
        let attrs = decode_request(req).await;
        let kind = self
            .classifier
            .classify(TypeAttr::parse(attrs.type_attr.as_deref()));
        tracing::trace!(id = ?attrs.id, source = ?attrs.source, %kind, "event received");
        Ok(StatusCode::OK.into_response())
    }
}
