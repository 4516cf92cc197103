//! Port for reading and settling outbox rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::outbox::OutboxMessage;

use super::define_port_error;

define_port_error! {
    /// Errors raised by outbox repository adapters.
    pub enum OutboxRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            transient "outbox repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "outbox repository query failed: {message}",
    }
}

/// Port used by the outbox relay.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Fetch up to `limit` unsent messages, oldest first.
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<OutboxMessage>, OutboxRepositoryError>;

    /// Mark a message as published.
    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<(), OutboxRepositoryError>;

    /// Record a failed publish attempt.
    async fn record_failure(&self, id: Uuid, message: &str) -> Result<(), OutboxRepositoryError>;
}
