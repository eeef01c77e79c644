use std::sync::Arc;

use rama::{
    bytes::Bytes,
    http::{BodyExtractExt as _, Uri, header::CONTENT_TYPE},
};

use super::{
    http::{self, Encoding, HEADER_CE_ID, HEADER_CE_SPECVERSION, HEADER_CE_TYPE},
    *,
};

fn source() -> Arc<str> {
    Arc::from("unit-test")
}

#[test]
fn test_type_attr_parse() {
    for (input, expected, kind) in [
        (
            Some("thpt.benchmark.continue"),
            TypeAttr::Known(EventKind::Workload),
            EventKind::Workload,
        ),
        (
            Some("thpt.benchmark.gc"),
            TypeAttr::Known(EventKind::GcSignal),
            EventKind::GcSignal,
        ),
        (
            Some(" thpt.benchmark.end "),
            TypeAttr::Known(EventKind::EndSignal),
            EventKind::EndSignal,
        ),
        (
            Some("dev.example.unknown"),
            TypeAttr::Unrecognized("dev.example.unknown"),
            EventKind::Workload,
        ),
        (None, TypeAttr::Missing, EventKind::Workload),
    ] {
        let attr = TypeAttr::parse(input);
        assert_eq!(attr, expected, "input: {input:?}");
        assert_eq!(attr.kind(), kind, "input: {input:?}");
    }
}

#[test]
fn test_event_kind_wire_values_are_distinct() {
    let kinds = [EventKind::Workload, EventKind::GcSignal, EventKind::EndSignal];
    for kind in kinds {
        assert_eq!(EventKind::from_type_attr(kind.as_type_attr()), Some(kind));
        assert_eq!(kind.is_control(), kind != EventKind::Workload);
    }
}

#[test]
fn test_message_ids() {
    assert_eq!(MessageId::Sequence(42).to_string(), "42");
    assert_eq!(MessageId::Signal(3).to_string(), "signal-3");
    assert_ne!(MessageId::Sequence(3), MessageId::Signal(3));

    let msg = ControlMessage::workload(7, source(), Bytes::from_static(b"abc"));
    assert_eq!(msg.sequence(), Some(7));
    let msg = ControlMessage::signal(1, EventKind::EndSignal, source());
    assert_eq!(msg.sequence(), None);
    assert!(msg.payload.is_empty());
}

#[test]
fn test_encoding_from_str() {
    assert_eq!("binary".parse::<Encoding>().unwrap(), Encoding::Binary);
    assert_eq!("Structured".parse::<Encoding>().unwrap(), Encoding::Structured);
    assert!("json".parse::<Encoding>().is_err());
}

#[test]
fn test_encode_binary_request() {
    let target: Uri = "http://127.0.0.1:8080/".parse().unwrap();
    let msg = ControlMessage::workload(12, source(), Bytes::from_static(b"filler"));

    let req = http::encode_request(&msg, &target, Encoding::Binary).unwrap();
    assert_eq!(req.method(), "POST");
    assert_eq!(req.uri(), &target);
    assert_eq!(req.headers()[HEADER_CE_ID], "12");
    assert_eq!(req.headers()[HEADER_CE_TYPE], "thpt.benchmark.continue");
    assert_eq!(req.headers()[HEADER_CE_SPECVERSION], SPEC_VERSION);
    assert_eq!(req.headers()[CONTENT_TYPE], "text/plain");
}

#[tokio::test]
async fn test_binary_request_decodes_attrs() {
    let target: Uri = "http://127.0.0.1:8080/".parse().unwrap();
    let msg = ControlMessage::signal(2, EventKind::GcSignal, source());

    let req = http::encode_request(&msg, &target, Encoding::Binary).unwrap();
    let attrs = http::decode_request(req).await;

    assert_eq!(attrs.id.as_deref(), Some("signal-2"));
    assert_eq!(attrs.type_attr.as_deref(), Some("thpt.benchmark.gc"));
    assert_eq!(attrs.source.as_deref(), Some("unit-test"));
}

#[tokio::test]
async fn test_structured_request_carries_filler() {
    let target: Uri = "http://127.0.0.1:8080/".parse().unwrap();
    let msg = ControlMessage::workload(0, source(), Bytes::from_static(b"xyz"));

    let req = http::encode_request(&msg, &target, Encoding::Structured).unwrap();
    assert_eq!(req.headers()[CONTENT_TYPE], "application/cloudevents+json");

    let doc: serde_json::Value = req.try_into_json().await.unwrap();
    assert_eq!(doc["type"], "thpt.benchmark.continue");
    assert_eq!(doc["id"], "0");
    assert_eq!(doc["data"], "xyz");
    assert_eq!(doc["specversion"], SPEC_VERSION);
}

#[tokio::test]
async fn test_structured_request_decodes_attrs() {
    let target: Uri = "http://127.0.0.1:8080/".parse().unwrap();
    let msg = ControlMessage::signal(9, EventKind::EndSignal, source());

    let req = http::encode_request(&msg, &target, Encoding::Structured).unwrap();
    let attrs = http::decode_request(req).await;

    assert_eq!(attrs.type_attr.as_deref(), Some("thpt.benchmark.end"));
    assert_eq!(TypeAttr::parse(attrs.type_attr.as_deref()).kind(), EventKind::EndSignal);
}

#[tokio::test]
async fn test_decode_request_without_attrs() {
    let req = rama::http::Request::builder()
        .method("POST")
        .uri("/")
        .body(rama::http::Body::from("hello"))
        .unwrap();

    let attrs = http::decode_request(req).await;
    assert_eq!(attrs, http::InboundAttrs::default());
    assert_eq!(TypeAttr::parse(attrs.type_attr.as_deref()), TypeAttr::Missing);
}
