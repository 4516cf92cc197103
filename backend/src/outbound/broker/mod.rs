//! AMQP 0-9-1 broker adapters built on `lapin`.

mod connection;
mod publisher;

pub use connection::{BrokerConnection, BrokerError};
pub(crate) use connection::declare_consumer_topology;
pub use publisher::AmqpEventPublisher;
