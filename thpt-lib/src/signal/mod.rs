//! Control-signal protocol shared by sender and receiver.
//!
//! Every message sent over a transport is a [`ControlMessage`] whose
//! [`EventKind`] tells the receiver whether it is measured traffic
//! ([`EventKind::Workload`]) or run coordination
//! ([`EventKind::GcSignal`], [`EventKind::EndSignal`]).

use std::{fmt, sync::Arc};

use rama::bytes::Bytes;

pub mod http;

#[cfg(test)]
mod tests;

/// CloudEvents spec version used for all emitted events.
pub const SPEC_VERSION: &str = "0.2";

/// Source identifier used when none is configured.
pub const DEFAULT_EVENT_SOURCE: &str = "eventing-thpt-sender";

const TYPE_WORKLOAD: &str = "thpt.benchmark.continue";
const TYPE_GC_SIGNAL: &str = "thpt.benchmark.gc";
const TYPE_END_SIGNAL: &str = "thpt.benchmark.end";

/// The closed set of message types the benchmark understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Counted toward measured throughput.
    Workload,
    /// Asks the receiver to run a full collection before acknowledging.
    GcSignal,
    /// Marks the end of the run, emitted exactly once per run.
    EndSignal,
}

impl EventKind {
    /// Wire value of the type attribute.
    pub const fn as_type_attr(self) -> &'static str {
        match self {
            EventKind::Workload => TYPE_WORKLOAD,
            EventKind::GcSignal => TYPE_GC_SIGNAL,
            EventKind::EndSignal => TYPE_END_SIGNAL,
        }
    }

    pub fn from_type_attr(value: &str) -> Option<Self> {
        match value.trim() {
            TYPE_WORKLOAD => Some(EventKind::Workload),
            TYPE_GC_SIGNAL => Some(EventKind::GcSignal),
            TYPE_END_SIGNAL => Some(EventKind::EndSignal),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn is_control(self) -> bool {
        !matches!(self, EventKind::Workload)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_type_attr())
    }
}

/// Type attribute as found on an inbound message.
///
/// Unrecognized and missing tags are kept apart from the known kinds
/// so they can be logged, yet [`TypeAttr::kind`] still counts them
/// as [`EventKind::Workload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAttr<'a> {
    Known(EventKind),
    Unrecognized(&'a str),
    Missing,
}

impl<'a> TypeAttr<'a> {
    pub fn parse(value: Option<&'a str>) -> Self {
        match value {
            None => TypeAttr::Missing,
            Some(value) => match EventKind::from_type_attr(value) {
                Some(kind) => TypeAttr::Known(kind),
                None => TypeAttr::Unrecognized(value),
            },
        }
    }

    /// Kind to act upon, with unknown tags falling back to workload.
    pub fn kind(&self) -> EventKind {
        match self {
            TypeAttr::Known(kind) => *kind,
            TypeAttr::Unrecognized(_) | TypeAttr::Missing => EventKind::Workload,
        }
    }
}

/// Identifier of a message, unique within a run.
///
/// Workload messages are numbered by a gapless per-run sequence,
/// control signals by their own counter so they never punch holes in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    Sequence(u64),
    Signal(u32),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Sequence(seq) => write!(f, "{seq}"),
            MessageId::Signal(n) => write!(f, "signal-{n}"),
        }
    }
}

/// A unit sent over the transport.
#[derive(Debug, Clone)]
pub struct ControlMessage {
    pub id: MessageId,
    pub kind: EventKind,
    pub source: Arc<str>,
    /// Opaque filler, only non-empty for [`EventKind::Workload`].
    pub payload: Bytes,
}

impl ControlMessage {
    pub fn workload(seq: u64, source: Arc<str>, payload: Bytes) -> Self {
        Self {
            id: MessageId::Sequence(seq),
            kind: EventKind::Workload,
            source,
            payload,
        }
    }

    /// Create a control signal message.
    ///
    /// Passing [`EventKind::Workload`] yields an empty workload message,
    /// which is only useful as a probe.
    pub fn signal(n: u32, kind: EventKind, source: Arc<str>) -> Self {
        Self {
            id: MessageId::Signal(n),
            kind,
            source,
            payload: Bytes::new(),
        }
    }

    /// Sequence number for workload messages, `None` for signals.
    pub fn sequence(&self) -> Option<u64> {
        match self.id {
            MessageId::Sequence(seq) => Some(seq),
            MessageId::Signal(_) => None,
        }
    }
}
