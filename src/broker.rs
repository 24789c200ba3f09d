use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::delivery::{
    DeliveryController, DeliveryVerdict, ProcessJob, PublishError, ResultPublisher,
};
use crate::models::result::ProcessingResult;

const CONSUMER_TAG: &str = "logo-preserve-worker";
const DETECTION_ROUTING_KEY: &str = "detection";

/// Owns the AMQP connection and channel for the lifetime of the worker.
///
/// Topology is declared up front: a durable direct exchange, the detection
/// queue bound under the `detection` routing key, and the results queue bound
/// under the configured results routing key. Prefetch is 1 so exactly one job
/// is in flight per worker instance.
pub struct BrokerSession {
    connection: Connection,
    channel: Channel,
    exchange: String,
    detection_queue: String,
    results_routing_key: String,
}

impl BrokerSession {
    /// Connect and declare topology. A connection failure here is fatal to
    /// worker startup; there is no point consuming without a broker.
    pub async fn connect(config: &AppConfig) -> Result<Self, BrokerError> {
        tracing::info!(url = %config.amqp_url, "Connecting to RabbitMQ");
        let connection =
            Connection::connect(&config.amqp_url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                &config.amqp_exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_declare(
                &config.detection_queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                &config.detection_queue,
                &config.amqp_exchange,
                DETECTION_ROUTING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_declare(
                &config.results_queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                &config.results_queue,
                &config.amqp_exchange,
                &config.results_routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        channel.basic_qos(1, BasicQosOptions::default()).await?;

        tracing::info!("Connected to RabbitMQ, topology declared");
        Ok(Self {
            connection,
            channel,
            exchange: config.amqp_exchange.clone(),
            detection_queue: config.detection_queue.clone(),
            results_routing_key: config.results_routing_key.clone(),
        })
    }

    /// Publisher for the results queue, sharing this session's channel.
    pub fn result_publisher(&self) -> AmqpResultPublisher {
        AmqpResultPublisher {
            channel: self.channel.clone(),
            exchange: self.exchange.clone(),
            routing_key: self.results_routing_key.clone(),
        }
    }

    /// Consume deliveries until shutdown, feeding each one to the controller
    /// and applying its verdict.
    ///
    /// A shutdown signal stops the loop before the next delivery is fetched;
    /// it never preempts a delivery mid-processing, so every consumed message
    /// reaches its ack/nack before the connection closes. The graceful close
    /// runs whether the loop ended by shutdown or by a broker error.
    pub async fn run<P: ProcessJob, R: ResultPublisher>(
        &self,
        controller: &DeliveryController<P, R>,
    ) -> Result<(), BrokerError> {
        let mut consumer = self
            .channel
            .basic_consume(
                &self.detection_queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(true);
            }
        });

        tracing::info!(queue = %self.detection_queue, "Worker ready, waiting for messages");

        let loop_result = self
            .consume_loop(&mut consumer, &mut shutdown_rx, controller)
            .await;
        let close_result = self.close().await;
        loop_result.and(close_result)
    }

    async fn consume_loop<P: ProcessJob, R: ResultPublisher>(
        &self,
        consumer: &mut Consumer,
        shutdown_rx: &mut watch::Receiver<bool>,
        controller: &DeliveryController<P, R>,
    ) -> Result<(), BrokerError> {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let delivery = tokio::select! {
                _ = shutdown_rx.changed() => {
                    tracing::info!("Shutdown signal received, stopping consumer");
                    break;
                }
                next = consumer.next() => match next {
                    Some(Ok(delivery)) => delivery,
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Consumer error");
                        continue;
                    }
                    None => {
                        tracing::warn!("Consumer stream closed by broker");
                        break;
                    }
                },
            };

            let count = delivery_count(&delivery);
            let verdict = controller.handle(&delivery.data, count).await;
            match verdict {
                DeliveryVerdict::Ack => delivery.ack(BasicAckOptions::default()).await?,
                DeliveryVerdict::Reject { requeue } => {
                    delivery
                        .nack(BasicNackOptions {
                            requeue,
                            ..Default::default()
                        })
                        .await?
                }
            }
        }

        Ok(())
    }

    /// Close channel and connection in order.
    pub async fn close(&self) -> Result<(), BrokerError> {
        self.channel.close(200, "worker shutdown").await?;
        self.connection.close(200, "worker shutdown").await?;
        tracing::info!("Broker session closed");
        Ok(())
    }
}

/// Redelivery count as reported by quorum queues via `x-delivery-count`.
/// Classic queues do not set the header; callers get `None` there.
fn delivery_count(delivery: &Delivery) -> Option<u32> {
    let headers = delivery.properties.headers().as_ref()?;
    match headers.inner().get(&ShortString::from("x-delivery-count"))? {
        AMQPValue::LongLongInt(n) => u32::try_from(*n).ok(),
        AMQPValue::LongInt(n) => u32::try_from(*n).ok(),
        AMQPValue::LongUInt(n) => Some(*n),
        AMQPValue::ShortShortUInt(n) => Some(u32::from(*n)),
        AMQPValue::ShortUInt(n) => Some(u32::from(*n)),
        _ => None,
    }
}

/// Publishes results persistently (`delivery_mode=2`, JSON content type) on
/// the session's exchange under the results routing key.
pub struct AmqpResultPublisher {
    channel: Channel,
    exchange: String,
    routing_key: String,
}

impl ResultPublisher for AmqpResultPublisher {
    async fn publish(&self, result: &ProcessingResult) -> Result<(), PublishError> {
        let body = serde_json::to_vec(result)?;
        self.channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_content_type("application/json".into()),
            )
            .await?
            .await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),
}
