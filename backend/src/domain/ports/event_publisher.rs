//! Driven port for publishing domain events to the broker.

use async_trait::async_trait;

use crate::domain::events::EventEnvelope;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by event publishers.
    pub enum EventPublisherError {
        /// Broker I/O failed; the caller decides whether to retry.
        Transport { message: String } => transient "event publish transport failed: {message}",
        /// The envelope could not be encoded as a message body.
        Encode { message: String } => "event encode failed: {message}",
    }
}

/// Port for publishing event envelopes.
///
/// Implementations publish to their configured exchange using
/// `envelope.event_type` as the routing key and do not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one envelope.
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), EventPublisherError>;
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        assert!(EventPublisherError::transport("connection reset").is_transient());
        assert!(!EventPublisherError::encode("bad json").is_transient());
    }
}
