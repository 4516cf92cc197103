//! PostgreSQL-backed `OutboxRepository`.
//!
//! Pending rows are read oldest first. The relay is expected to run as a
//! single instance, so rows are not claimed with `SKIP LOCKED`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::events::EventEnvelope;
use crate::domain::outbox::OutboxMessage;
use crate::domain::ports::{OutboxRepository, OutboxRepositoryError};

use super::diesel_basic_error_mapping::{count_from_db, map_basic_diesel_error, map_basic_pool_error};
use super::models::OutboxRow;
use super::pool::DbPool;
use super::schema::outbox_messages;

/// Longest failure message kept in `last_error`.
const LAST_ERROR_MAX_CHARS: usize = 1_000;

/// Diesel repository backing the outbox relay.
#[derive(Clone)]
pub struct DieselOutboxRepository {
    pool: DbPool,
}

impl DieselOutboxRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_diesel_error(operation: &str) -> impl FnOnce(diesel::result::Error) -> OutboxRepositoryError + '_ {
    move |error| {
        map_basic_diesel_error(
            error,
            operation,
            OutboxRepositoryError::query,
            OutboxRepositoryError::connection,
        )
    }
}

fn row_to_message(row: OutboxRow) -> Result<OutboxMessage, OutboxRepositoryError> {
    Ok(OutboxMessage {
        id: row.id,
        envelope: EventEnvelope {
            event_type: row.event_type,
            payload: row.payload,
            trace_id: row.trace_id,
        },
        created_at: row.created_at,
        attempts: count_from_db(row.attempts, "attempts").map_err(OutboxRepositoryError::query)?,
        last_error: row.last_error,
        sent_at: row.sent_at,
    })
}

fn truncate_error(message: &str) -> String {
    message.chars().take(LAST_ERROR_MAX_CHARS).collect()
}

#[async_trait]
impl OutboxRepository for DieselOutboxRepository {
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<OutboxMessage>, OutboxRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, OutboxRepositoryError::connection))?;

        let rows: Vec<OutboxRow> = outbox_messages::table
            .filter(outbox_messages::sent_at.is_null())
            .order_by((outbox_messages::created_at.asc(), outbox_messages::id.asc()))
            .limit(i64::from(limit))
            .select(OutboxRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error("fetch pending outbox messages"))?;

        rows.into_iter().map(row_to_message).collect()
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<(), OutboxRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, OutboxRepositoryError::connection))?;

        diesel::update(outbox_messages::table.find(id))
            .set(outbox_messages::sent_at.eq(Some(sent_at)))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error("mark outbox message sent"))
    }

    async fn record_failure(&self, id: Uuid, message: &str) -> Result<(), OutboxRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, OutboxRepositoryError::connection))?;

        diesel::update(outbox_messages::table.find(id))
            .set((
                outbox_messages::attempts.eq(outbox_messages::attempts + 1),
                outbox_messages::last_error.eq(Some(truncate_error(message))),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error("record outbox failure"))
    }
}
