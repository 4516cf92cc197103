//! Process-wide AMQP connection handle.
//!
//! One [`BrokerConnection`] is opened at startup and cloned into every
//! publisher and consumer. Each of those opens its own channel.

use std::sync::Arc;

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};
use thiserror::Error;

use crate::topology::ConsumerTopology;

const DEAD_LETTER_EXCHANGE_ARGUMENT: &str = "x-dead-letter-exchange";
const QUEUE_TYPE_ARGUMENT: &str = "x-queue-type";
/// Quorum queues stamp `x-delivery-count` on every redelivery, which the
/// consumer's redelivery threshold reads.
const QUORUM_QUEUE_TYPE: &str = "quorum";
const CONNECTION_CLOSE_REPLY_CODE: u16 = 200;

/// Errors raised while talking to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The connection could not be opened.
    #[error("broker connection failed: {message}")]
    Connect { message: String },
    /// A channel could not be opened or configured.
    #[error("broker channel error: {message}")]
    Channel { message: String },
    /// Declaring an exchange, queue, or binding failed.
    #[error("broker topology declaration failed for {name}: {message}")]
    Topology { name: String, message: String },
    /// Closing the connection or a channel failed.
    #[error("broker close failed: {message}")]
    Close { message: String },
}

/// Shared handle to an open AMQP connection.
#[derive(Clone)]
pub struct BrokerConnection {
    inner: Arc<Connection>,
}

impl BrokerConnection {
    /// Open a connection to `url` driven by the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Connect`] when the broker is unreachable or
    /// rejects the credentials.
    pub async fn connect(url: &str, connection_name: &str) -> Result<Self, BrokerError> {
        let properties = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio)
            .with_connection_name(LongString::from(connection_name.to_owned()));

        let connection = Connection::connect(url, properties)
            .await
            .map_err(|err| BrokerError::Connect {
                message: err.to_string(),
            })?;
        tracing::info!(connection_name, "broker connection established");
        Ok(Self {
            inner: Arc::new(connection),
        })
    }

    /// Open a new channel on this connection.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Channel`] when the connection is closed.
    pub async fn create_channel(&self) -> Result<Channel, BrokerError> {
        self.inner
            .create_channel()
            .await
            .map_err(|err| BrokerError::Channel {
                message: err.to_string(),
            })
    }

    /// Whether the underlying connection is still usable.
    pub fn is_connected(&self) -> bool {
        self.inner.status().connected()
    }

    /// Close the connection for every holder of this handle.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Close`] when the close handshake fails.
    pub async fn close(&self) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Ok(());
        }
        self.inner
            .close(CONNECTION_CLOSE_REPLY_CODE, "shutdown")
            .await
            .map_err(|err| BrokerError::Close {
                message: err.to_string(),
            })
    }
}

/// Declare a durable topic exchange. Redeclaring with the same settings is a
/// no-op on the broker.
pub(crate) async fn declare_topic_exchange(channel: &Channel, exchange: &str) -> Result<(), BrokerError> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|err| topology_error(exchange, &err))
}

/// Arguments of a consumer's main queue: always a quorum queue, routed to
/// the dead-letter exchange when enabled.
pub(crate) fn queue_arguments(topology: &ConsumerTopology) -> FieldTable {
    let mut arguments = FieldTable::default();
    arguments.insert(
        ShortString::from(QUEUE_TYPE_ARGUMENT.to_owned()),
        AMQPValue::LongString(LongString::from(QUORUM_QUEUE_TYPE.to_owned())),
    );
    if topology.dead_letter {
        arguments.insert(
            ShortString::from(DEAD_LETTER_EXCHANGE_ARGUMENT.to_owned()),
            AMQPValue::LongString(LongString::from(topology.dead_letter_exchange())),
        );
    }
    arguments
}

/// Declare everything `topology` needs: exchange, queue, bindings and,
/// when enabled, the dead-letter exchange and queue.
pub(crate) async fn declare_consumer_topology(
    channel: &Channel,
    topology: &ConsumerTopology,
) -> Result<(), BrokerError> {
    declare_topic_exchange(channel, &topology.exchange).await?;

    if topology.dead_letter {
        let dlx = topology.dead_letter_exchange();
        let dlq = topology.dead_letter_queue();
        channel
            .exchange_declare(
                &dlx,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|err| topology_error(&dlx, &err))?;
        channel
            .queue_declare(&dlq, durable_queue(), FieldTable::default())
            .await
            .map_err(|err| topology_error(&dlq, &err))?;
        channel
            .queue_bind(&dlq, &dlx, "", QueueBindOptions::default(), FieldTable::default())
            .await
            .map_err(|err| topology_error(&dlq, &err))?;
    }

    channel
        .queue_declare(&topology.queue, durable_queue(), queue_arguments(topology))
        .await
        .map_err(|err| topology_error(&topology.queue, &err))?;

    for routing_key in &topology.routing_keys {
        channel
            .queue_bind(
                &topology.queue,
                &topology.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|err| topology_error(&topology.queue, &err))?;
    }

    tracing::info!(
        exchange = %topology.exchange,
        queue = %topology.queue,
        routing_keys = ?topology.routing_keys,
        dead_letter = topology.dead_letter,
        "consumer topology declared"
    );
    Ok(())
}

fn durable_queue() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..QueueDeclareOptions::default()
    }
}

fn topology_error(name: &str, err: &lapin::Error) -> BrokerError {
    BrokerError::Topology {
        name: name.to_owned(),
        message: err.to_string(),
    }
}
