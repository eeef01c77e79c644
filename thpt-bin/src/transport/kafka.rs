use std::time::Duration;

use rama::{
    Service,
    error::{BoxError, ErrorContext as _},
    telemetry::tracing,
};
use rdkafka::{
    config::ClientConfig,
    message::{Header, OwnedHeaders},
    producer::{FutureProducer, FutureRecord},
};

use eventing_thpt_lib::signal::{ControlMessage, SPEC_VERSION};

const HEADER_CE_ID: &str = "ce_id";
const HEADER_CE_TYPE: &str = "ce_type";
const HEADER_CE_SOURCE: &str = "ce_source";
const HEADER_CE_SPECVERSION: &str = "ce_specversion";

const MESSAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// librdkafka default and maximum of `queue.buffering.max.messages`.
const QUEUE_BUFFERING_MAX_MESSAGES_DEFAULT: u64 = 100_000;
const QUEUE_BUFFERING_MAX_MESSAGES_LIMIT: u64 = i32::MAX as u64;

/// Size of the local producer queue for a requested capacity,
/// never below the librdkafka default nor above its limit.
fn queue_buffering_max_messages(queue_capacity: u64) -> u64 {
    queue_capacity.clamp(
        QUEUE_BUFFERING_MAX_MESSAGES_DEFAULT,
        QUEUE_BUFFERING_MAX_MESSAGES_LIMIT,
    )
}

/// Produces messages as binary mode CloudEvents onto a single topic.
///
/// A record is queued synchronously on the first poll of a send, so sends
/// polled in order reach the broker queue in order. A full local queue
/// fails the send instead of retrying it. The send completes once
/// the broker acknowledged the record.
pub struct KafkaTransport {
    producer: FutureProducer,
    topic: String,
}

impl std::fmt::Debug for KafkaTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaTransport")
            .field("topic", &self.topic)
            .finish()
    }
}

impl KafkaTransport {
    /// Create a producer for `topic` whose local queue can hold
    /// at least `queue_capacity` messages, within librdkafka's limits.
    pub fn try_new(
        bootstrap_servers: &str,
        topic: String,
        queue_capacity: u64,
    ) -> Result<Self, BoxError> {
        let queue_size = queue_buffering_max_messages(queue_capacity);
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set(
                "message.timeout.ms",
                MESSAGE_TIMEOUT.as_millis().to_string(),
            )
            .set("queue.buffering.max.messages", queue_size.to_string())
            .create()
            .context("create kafka producer")
            .with_context_field("bootstrap_servers", || bootstrap_servers.to_owned())?;

        tracing::debug!(%topic, %queue_capacity, %queue_size, "kafka transport created");

        Ok(Self { producer, topic })
    }
}

impl Service<ControlMessage> for KafkaTransport {
    type Output = ();
    type Error = BoxError;

    async fn serve(&self, msg: ControlMessage) -> Result<Self::Output, Self::Error> {
        let id = msg.id.to_string();
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: HEADER_CE_ID,
                value: Some(id.as_str()),
            })
            .insert(Header {
                key: HEADER_CE_TYPE,
                value: Some(msg.kind.as_type_attr()),
            })
            .insert(Header {
                key: HEADER_CE_SOURCE,
                value: Some(&*msg.source),
            })
            .insert(Header {
                key: HEADER_CE_SPECVERSION,
                value: Some(SPEC_VERSION),
            });

        let record = FutureRecord::to(&self.topic)
            .key(id.as_str())
            .payload(&msg.payload[..])
            .headers(headers);

        let delivery = match self.producer.send_result(record) {
            Ok(delivery) => delivery,
            Err((err, _)) => {
                return Err(BoxError::from(err)
                    .context("queue kafka record")
                    .context_field("id", id));
            }
        };

        match delivery.await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err((err, _))) => Err(BoxError::from(err)
                .context("produce kafka record")
                .context_field("id", id)),
            Err(canceled) => Err(BoxError::from(canceled)
                .context("kafka delivery canceled")
                .context_field("id", id)),
        }
    }
}
