//! Outbox rows written alongside diary entries.
//!
//! An outbox message is the durable form of an [`EventEnvelope`]. It is
//! inserted in the same transaction as the state change that produced the
//! event and later handed to a publisher by the relay.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::events::EventEnvelope;

/// Pending or delivered outbox row.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub envelope: EventEnvelope,
    pub created_at: DateTime<Utc>,
    /// Failed publish attempts so far.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    /// Build a new pending message for `envelope`.
    #[must_use]
    pub fn pending(envelope: EventEnvelope, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            envelope,
            created_at,
            attempts: 0,
            last_error: None,
            sent_at: None,
        }
    }

    /// Whether the relay still has to publish this message.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.sent_at.is_none()
    }
}
