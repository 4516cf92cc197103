//! Broker-neutral delivery dispatch.
//!
//! [`dispatch`] runs one handler call and settles the delivery exactly once:
//! ack on success, nack with requeue on failure, or nack without requeue
//! once the redelivery threshold is reached so the broker dead-letters it.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::TraceId;

use super::EventHandler;

/// A delivery stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundDelivery {
    pub routing_key: String,
    pub body: Vec<u8>,
    /// Previous delivery attempts of this message.
    pub delivery_count: u32,
    pub trace_id: Option<TraceId>,
}

/// Failure to settle a delivery with the broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery settlement failed: {message}")]
pub struct SettlementError {
    pub message: String,
}

impl SettlementError {
    /// Build an error from any displayable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Settles one delivery with the broker.
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    /// Positively acknowledge the delivery.
    async fn ack(&self) -> Result<(), SettlementError>;

    /// Reject the delivery, optionally returning it to the queue.
    async fn nack(&self, requeue: bool) -> Result<(), SettlementError>;
}

/// Bound on how often a failing message is redelivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    /// Total deliveries allowed before dead-lettering. `None` requeues
    /// forever.
    pub max_deliveries: Option<u32>,
}

impl RedeliveryPolicy {
    /// Requeue failures without limit.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_deliveries: None,
        }
    }

    /// Dead-letter after `max` deliveries.
    #[must_use]
    pub const fn bounded(max: u32) -> Self {
        Self {
            max_deliveries: Some(max),
        }
    }

    /// Whether a failed delivery with `previous` earlier attempts is the last.
    #[must_use]
    pub fn is_exhausted(&self, previous: u32) -> bool {
        self.max_deliveries
            .is_some_and(|max| previous.saturating_add(1) >= max)
    }
}

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Requeue,
    DeadLetter,
}

/// Run `handler` for `delivery` and settle it through `acker`.
///
/// The handler runs inside the delivery's trace scope, or a fresh one when
/// the message carried none. Settlement failures are logged; the broker
/// redelivers unsettled messages once the channel closes.
pub async fn dispatch<H, A>(
    handler: &H,
    delivery: InboundDelivery,
    acker: &A,
    policy: RedeliveryPolicy,
) -> Settlement
where
    H: EventHandler + ?Sized,
    A: DeliveryAcker + ?Sized,
{
    let trace_id = delivery.trace_id.unwrap_or_else(TraceId::generate);
    TraceId::scope(trace_id, async move {
        let outcome = handler.handle(&delivery.body).await;
        let (settlement, result) = match outcome {
            Ok(()) => (Settlement::Ack, acker.ack().await),
            Err(err) if policy.is_exhausted(delivery.delivery_count) => {
                tracing::error!(
                    routing_key = %delivery.routing_key,
                    delivery_count = delivery.delivery_count,
                    error = %err,
                    "redelivery limit reached; dead-lettering message"
                );
                (Settlement::DeadLetter, acker.nack(false).await)
            }
            Err(err) => {
                tracing::warn!(
                    routing_key = %delivery.routing_key,
                    delivery_count = delivery.delivery_count,
                    error = %err,
                    "handler failed; requeueing message"
                );
                (Settlement::Requeue, acker.nack(true).await)
            }
        };
        if let Err(err) = result {
            tracing::error!(
                routing_key = %delivery.routing_key,
                ?settlement,
                error = %err,
                "failed to settle delivery"
            );
        }
        settlement
    })
    .await
}
