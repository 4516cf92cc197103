//! Outbox relay: publish committed events in insertion order.
//!
//! Rows are fetched oldest first and published one at a time. The first
//! failure ends the batch so later events never overtake an earlier one;
//! the failed row is retried on the next poll.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tokio_util::sync::CancellationToken;

use crate::domain::ports::{EventPublisher, OutboxRepository, OutboxRepositoryError};
use crate::domain::{Error, TraceId};

/// Default number of rows fetched per poll.
pub const DEFAULT_BATCH_SIZE: u32 = 100;
/// Default pause between polls that found less than a full batch.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

fn map_repository_error(error: OutboxRepositoryError) -> Error {
    match error {
        OutboxRepositoryError::Connection { message } => {
            Error::internal(format!("outbox repository unavailable: {message}"))
        }
        OutboxRepositoryError::Query { message } => {
            Error::internal(format!("outbox repository error: {message}"))
        }
    }
}

/// Counts produced by one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Rows fetched from the outbox.
    pub fetched: usize,
    /// Rows published and marked sent.
    pub published: usize,
    /// Whether the pass stopped on a publish failure.
    pub stalled: bool,
}

/// Relay tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboxRelayConfig {
    pub batch_size: u32,
    pub poll_interval: Duration,
}

impl Default for OutboxRelayConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Moves outbox rows onto the broker.
pub struct OutboxRelay<R, P> {
    repository: Arc<R>,
    publisher: Arc<P>,
    clock: Arc<dyn Clock>,
    config: OutboxRelayConfig,
}

impl<R, P> OutboxRelay<R, P>
where
    R: OutboxRepository,
    P: EventPublisher,
{
    /// Create a relay.
    pub fn new(
        repository: Arc<R>,
        publisher: Arc<P>,
        clock: Arc<dyn Clock>,
        config: OutboxRelayConfig,
    ) -> Self {
        Self {
            repository,
            publisher,
            clock,
            config,
        }
    }

    /// Publish one batch of pending rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] with an internal code when the outbox cannot be
    /// read or a published row cannot be marked sent.
    pub async fn relay_batch(&self) -> Result<RelayReport, Error> {
        let pending = self
            .repository
            .fetch_pending(self.config.batch_size)
            .await
            .map_err(map_repository_error)?;
        let mut report = RelayReport {
            fetched: pending.len(),
            ..RelayReport::default()
        };

        for message in pending {
            let publish = async { self.publisher.publish(&message.envelope).await };
            let outcome = match message.envelope.trace_id {
                Some(trace_id) => TraceId::scope(TraceId::from_uuid(trace_id), publish).await,
                None => publish.await,
            };

            if let Err(err) = outcome {
                tracing::warn!(
                    outbox_id = %message.id,
                    event_type = %message.envelope.event_type,
                    attempts = message.attempts.saturating_add(1),
                    error = %err,
                    "outbox publish failed; stopping batch"
                );
                if let Err(record_err) = self
                    .repository
                    .record_failure(message.id, &err.to_string())
                    .await
                {
                    tracing::warn!(outbox_id = %message.id, error = %record_err, "failed to record outbox failure");
                }
                report.stalled = true;
                break;
            }

            self.repository
                .mark_sent(message.id, self.clock.utc())
                .await
                .map_err(map_repository_error)?;
            report.published += 1;
        }

        if report.fetched > 0 {
            tracing::debug!(
                fetched = report.fetched,
                published = report.published,
                stalled = report.stalled,
                "outbox batch relayed"
            );
        }
        Ok(report)
    }

    /// Relay until `cancel` fires.
    ///
    /// A full batch is followed immediately by another pass; anything less
    /// waits for the poll interval.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = u64::try_from(self.config.poll_interval.as_millis()).unwrap_or(u64::MAX),
            "outbox relay started"
        );
        loop {
            let report = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.relay_batch() => result,
            };

            let drained = match report {
                Ok(report) => {
                    report.stalled
                        || u32::try_from(report.fetched).unwrap_or(u32::MAX) < self.config.batch_size
                }
                Err(err) => {
                    tracing::error!(error = %err, "outbox relay pass failed");
                    true
                }
            };
            if !drained {
                continue;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        tracing::info!("outbox relay stopped");
    }
}

#[cfg(test)]
#[path = "outbox_relay_tests.rs"]
mod tests;
