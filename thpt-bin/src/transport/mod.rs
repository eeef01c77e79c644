//! Transports delivering [`ControlMessage`]s to the system under test.
//!
//! [`ControlMessage`]: eventing_thpt_lib::signal::ControlMessage

mod http;
#[doc(inline)]
pub use http::HttpTransport;

#[cfg(feature = "kafka")]
mod kafka;
#[cfg(feature = "kafka")]
#[doc(inline)]
pub use kafka::KafkaTransport;
