//! AMQP implementation of the [`EventPublisher`] port.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel};

use crate::domain::TRACE_ID_HEADER;
use crate::domain::events::EventEnvelope;
use crate::domain::ports::{EventPublisher, EventPublisherError};

use super::connection::{BrokerConnection, BrokerError, declare_topic_exchange};

const JSON_CONTENT_TYPE: &str = "application/json";
const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Publishes envelopes to one topic exchange with publisher confirms.
pub struct AmqpEventPublisher {
    channel: Channel,
    exchange: String,
}

impl AmqpEventPublisher {
    /// Open a channel, enable confirms, and declare `exchange`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the channel cannot be opened or the
    /// exchange cannot be declared.
    pub async fn new(
        connection: &BrokerConnection,
        exchange: impl Into<String>,
    ) -> Result<Self, BrokerError> {
        let exchange = exchange.into();
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|err| BrokerError::Channel {
                message: err.to_string(),
            })?;
        declare_topic_exchange(&channel, &exchange).await?;
        Ok(Self { channel, exchange })
    }

    /// Exchange this publisher writes to.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }
}

/// AMQP properties for an envelope: JSON, persistent, trace header.
fn message_properties(envelope: &EventEnvelope) -> BasicProperties {
    let properties = BasicProperties::default()
        .with_content_type(ShortString::from(JSON_CONTENT_TYPE.to_owned()))
        .with_delivery_mode(PERSISTENT_DELIVERY_MODE);
    match envelope.trace_id {
        Some(trace_id) => {
            let mut headers = FieldTable::default();
            headers.insert(
                ShortString::from(TRACE_ID_HEADER.to_owned()),
                AMQPValue::LongString(LongString::from(trace_id.to_string())),
            );
            properties.with_headers(headers)
        }
        None => properties,
    }
}

fn transport_error(err: &lapin::Error) -> EventPublisherError {
    EventPublisherError::transport(err.to_string())
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), EventPublisherError> {
        let body = envelope
            .body()
            .map_err(|err| EventPublisherError::encode(err.to_string()))?;

        let confirmation = self
            .channel
            .basic_publish(
                &self.exchange,
                &envelope.event_type,
                BasicPublishOptions::default(),
                &body,
                message_properties(envelope),
            )
            .await
            .map_err(|err| transport_error(&err))?
            .await
            .map_err(|err| transport_error(&err))?;

        if let Confirmation::Nack(_) = confirmation {
            return Err(EventPublisherError::transport(format!(
                "broker rejected {} on {}",
                envelope.event_type, self.exchange
            )));
        }

        tracing::debug!(
            exchange = %self.exchange,
            routing_key = %envelope.event_type,
            bytes = body.len(),
            "event published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for message properties.
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use uuid::Uuid;

    fn envelope(trace_id: Option<Uuid>) -> EventEnvelope {
        EventEnvelope {
            event_type: "mail.send".to_owned(),
            payload: json!({ "template_id": "welcome" }),
            trace_id,
        }
    }

    #[rstest]
    fn properties_mark_json_and_persistent() {
        let properties = message_properties(&envelope(None));
        assert_eq!(
            properties.content_type().as_ref().map(ShortString::as_str),
            Some(JSON_CONTENT_TYPE)
        );
        assert_eq!(*properties.delivery_mode(), Some(PERSISTENT_DELIVERY_MODE));
        assert!(properties.headers().is_none());
    }

    #[rstest]
    fn trace_id_is_propagated_as_header() {
        let trace = Uuid::new_v4();
        let properties = message_properties(&envelope(Some(trace)));
        let headers = properties.headers().as_ref().expect("headers present");
        let value = headers
            .inner()
            .iter()
            .find(|(key, _)| key.as_str() == TRACE_ID_HEADER)
            .map(|(_, value)| value.clone())
            .expect("trace header present");
        assert_eq!(
            value,
            AMQPValue::LongString(LongString::from(trace.to_string()))
        );
    }
}
