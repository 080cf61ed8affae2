//! The AMQP-backed message bus (§1 Message Bus): a topic exchange with
//! durable per-connector submit queues, topic-routed deliver/dlr streams,
//! and a dead-letter/requeue delay channel.

use jasmin_conf::AmqpConfig;
use lapin::{
    options::{
        BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use tracing::{info, warn};

use crate::envelope::Envelope;
use crate::BusError;

/// Name of the dead-letter/requeue delay exchange (§1 Message Bus: "a
/// dead-letter/requeue delay channel").
pub const REQUEUE_EXCHANGE: &str = "messaging.requeue";

pub struct MessageBus {
    _connection: Connection,
    channel: Channel,
    exchange: String,
}

impl MessageBus {
    /// Connect and declare the topic exchange (idempotent: `declare` is a
    /// no-op against an already-matching exchange).
    pub async fn connect(config: &AmqpConfig) -> Result<Self, BusError> {
        let connection = Connection::connect(&config.amqp_uri(), ConnectionProperties::default())
            .await
            .map_err(BusError::Connect)?;
        let channel = connection.create_channel().await.map_err(BusError::Channel)?;

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(BusError::Topology)?;

        channel
            .exchange_declare(
                REQUEUE_EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(BusError::Topology)?;

        info!(exchange = %config.exchange, "message bus topology declared");

        Ok(Self {
            _connection: connection,
            channel,
            exchange: config.exchange.clone(),
        })
    }

    /// Declare a durable queue bound to `routing_key` on the main
    /// exchange. Used once per connector for its submit queue, and once
    /// per thrower for its deliver/dlr binding (§1, §6).
    pub async fn declare_queue(&self, queue_name: &str, routing_key: &str) -> Result<(), BusError> {
        self.channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(BusError::Topology)?;

        self.channel
            .queue_bind(
                queue_name,
                &self.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BusError::Topology)?;

        Ok(())
    }

    pub async fn publish(&self, routing_key: &str, envelope: &Envelope) -> Result<(), BusError> {
        self.channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &envelope.body,
                envelope.to_properties(),
            )
            .await
            .map_err(BusError::Publish)?
            .await
            .map_err(BusError::Publish)?;
        Ok(())
    }

    /// Publish to the requeue exchange with a per-message TTL, the
    /// throughput-cap and error-retrial backpressure mechanism (§4.4,
    /// §8 "Throughput cap transforms into requeue-with-delay, not drop").
    pub async fn requeue_with_delay(
        &self,
        routing_key: &str,
        envelope: &Envelope,
        delay_ms: u64,
    ) -> Result<(), BusError> {
        let properties = envelope.to_properties().with_expiration(delay_ms.to_string().into());
        self.channel
            .basic_publish(
                REQUEUE_EXCHANGE,
                routing_key,
                BasicPublishOptions::default(),
                &envelope.body,
                properties,
            )
            .await
            .map_err(BusError::Publish)?
            .await
            .map_err(BusError::Publish)?;
        Ok(())
    }

    pub async fn consume(&self, queue_name: &str, consumer_tag: &str) -> Result<Consumer, BusError> {
        self.channel
            .basic_consume(
                queue_name,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BusError::Consume)
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

impl Drop for MessageBus {
    fn drop(&mut self) {
        warn!("message bus handle dropped");
    }
}
