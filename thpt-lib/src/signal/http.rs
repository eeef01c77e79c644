//! CloudEvents over HTTP encoding of [`ControlMessage`]s.
//!
//! Binary mode carries the attributes as `ce-*` headers with the filler
//! as plain text body, structured mode carries a single JSON document.

use std::{fmt, str::FromStr};

use rama::{
    error::{BoxError, ErrorContext as _},
    http::{
        Body, BodyExtractExt as _, HeaderMap, HeaderName, HeaderValue, Method, Request, Uri,
        header::CONTENT_TYPE,
    },
};
use serde::{Deserialize, Serialize};

use super::{ControlMessage, SPEC_VERSION};

pub const HEADER_CE_ID: HeaderName = HeaderName::from_static("ce-id");
pub const HEADER_CE_TYPE: HeaderName = HeaderName::from_static("ce-type");
pub const HEADER_CE_SOURCE: HeaderName = HeaderName::from_static("ce-source");
pub const HEADER_CE_SPECVERSION: HeaderName = HeaderName::from_static("ce-specversion");

const CONTENT_TYPE_TEXT: &str = "text/plain";
const CONTENT_TYPE_STRUCTURED: &str = "application/cloudevents+json";

/// How events are laid out in an HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Binary,
    Structured,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Binary => "binary",
            Encoding::Structured => "structured",
        })
    }
}

impl FromStr for Encoding {
    type Err = BoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(Encoding::Binary),
            "structured" => Ok(Encoding::Structured),
            _ => Err(BoxError::from("unknown encoding: expected 'binary' or 'structured'")
                .context_field("encoding", s.to_owned())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StructuredEvent {
    specversion: String,
    id: String,
    #[serde(rename = "type")]
    ty: String,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datacontenttype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

/// Build a POST request to `target` carrying `msg`.
pub fn encode_request(
    msg: &ControlMessage,
    target: &Uri,
    encoding: Encoding,
) -> Result<Request, BoxError> {
    let builder = Request::builder().method(Method::POST).uri(target.clone());

    let req = match encoding {
        Encoding::Binary => builder
            .header(HEADER_CE_ID, msg.id.to_string())
            .header(HEADER_CE_TYPE, msg.kind.as_type_attr())
            .header(HEADER_CE_SOURCE, &*msg.source)
            .header(HEADER_CE_SPECVERSION, SPEC_VERSION)
            .header(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_TEXT))
            .body(Body::from(msg.payload.clone())),
        Encoding::Structured => {
            let event = StructuredEvent {
                specversion: SPEC_VERSION.to_owned(),
                id: msg.id.to_string(),
                ty: msg.kind.as_type_attr().to_owned(),
                source: msg.source.to_string(),
                datacontenttype: (!msg.payload.is_empty()).then(|| CONTENT_TYPE_TEXT.to_owned()),
                data: (!msg.payload.is_empty())
                    .then(|| String::from_utf8_lossy(&msg.payload).into_owned()),
            };
            let body = serde_json::to_vec(&event).context("serialize structured cloud event")?;
            builder
                .header(
                    CONTENT_TYPE,
                    HeaderValue::from_static(CONTENT_TYPE_STRUCTURED),
                )
                .body(Body::from(body))
        }
    };

    req.context("build cloud event http request")
        .with_context_field("id", || msg.id.to_string())
}

/// Attributes of an inbound event as far as the receiver cares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundAttrs {
    pub id: Option<String>,
    pub type_attr: Option<String>,
    pub source: Option<String>,
}

/// Decode the event attributes of an inbound request, consuming its body.
///
/// A structured body which fails to parse yields empty attributes
/// rather than an error, such a request still counts as workload.
pub async fn decode_request(req: Request) -> InboundAttrs {
    if is_structured(req.headers()) {
        return match req.try_into_json::<StructuredEvent>().await {
            Ok(event) => InboundAttrs {
                id: Some(event.id),
                type_attr: Some(event.ty),
                source: Some(event.source),
            },
            Err(_) => InboundAttrs::default(),
        };
    }

    let headers = req.headers();
    let attrs = InboundAttrs {
        id: header_str(headers, &HEADER_CE_ID),
        type_attr: header_str(headers, &HEADER_CE_TYPE),
        source: header_str(headers, &HEADER_CE_SOURCE),
    };

    // drain the body so the connection can be reused
    let _ = req.try_into_string().await;

    attrs
}

fn is_structured(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(CONTENT_TYPE_STRUCTURED))
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
}
