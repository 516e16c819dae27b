/// AMQP transport over a single durable queue used in both directions.

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tracing::info;

use super::transport::{InboundMessage, Transport, TransportError};
use crate::schema::envelope::{CorrelatedEnvelope, CorrelationId};

pub const DEFAULT_QUEUE: &str = "markov-generator";
pub const CONTENT_TYPE: &str = "application/protobuf";

pub struct AmqpTransport {
    // Dropping the connection closes the channel.
    _connection: Connection,
    channel: Channel,
    consumer: Consumer,
    queue: String,
}

impl AmqpTransport {
    /// Connect, declare the queue durable, and start consuming one
    /// unacknowledged message at a time.
    pub async fn connect(uri: &str, queue: &str) -> Result<Self, TransportError> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel.basic_qos(1, BasicQosOptions::default()).await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        let consumer = channel
            .basic_consume(
                queue,
                DEFAULT_QUEUE,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(queue, "listening for markov requests");
        Ok(Self {
            _connection: connection,
            channel,
            consumer,
            queue: queue.to_string(),
        })
    }
}

#[async_trait]
impl Transport for AmqpTransport {
    async fn receive(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        let Some(delivery) = self.consumer.next().await else {
            return Ok(None);
        };
        let delivery = delivery?;

        // Requests arrive without a content type; responses carry ours.
        let is_reply = delivery
            .properties
            .content_type()
            .as_ref()
            .is_some_and(|ct| ct.as_str() == CONTENT_TYPE);
        let correlation_id = delivery
            .properties
            .correlation_id()
            .as_ref()
            .map(|id| CorrelationId(id.as_str().to_string()));

        Ok(Some(InboundMessage {
            delivery_tag: delivery.delivery_tag,
            envelope: CorrelatedEnvelope::new(correlation_id, delivery.data),
            is_reply,
        }))
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), TransportError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await?;
        Ok(())
    }

    async fn publish(
        &mut self,
        response: CorrelatedEnvelope<Vec<u8>>,
    ) -> Result<(), TransportError> {
        let mut properties =
            BasicProperties::default().with_content_type(ShortString::from(CONTENT_TYPE));
        if let Some(id) = response.correlation_id {
            properties = properties.with_correlation_id(ShortString::from(id.0));
        }

        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &response.payload,
                properties,
            )
            .await?
            .await?;
        Ok(())
    }
}
