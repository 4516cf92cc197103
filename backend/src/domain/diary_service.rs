//! Diary creation use case.
//!
//! Inserts the entry, advances the streak, and enqueues `diary.created` in
//! one unit of work. Publication happens later through the outbox relay, so
//! a broker outage never loses an event for a committed entry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, Utc};
use mockable::Clock;

use crate::domain::calendar::{local_date, week_range};
use crate::domain::diary::DIARY_CONTENT_MAX_CHARS;
use crate::domain::events::{DiaryCreatedEvent, EventEnvelope};
use crate::domain::outbox::OutboxMessage;
use crate::domain::ports::{
    CreateDiaryRequest, CreateDiaryResponse, DiaryCommand, DiaryRepositoryError,
    DiaryTransactionManager, DiaryUnitOfWork,
};
use crate::domain::streak::advance;
use crate::domain::{DiaryEntry, DiaryId, Error, IdentityClaims};

fn map_repository_error(error: DiaryRepositoryError) -> Error {
    match error {
        DiaryRepositoryError::Connection { message } => {
            Error::internal(format!("diary repository unavailable: {message}"))
        }
        DiaryRepositoryError::Query { message } => {
            Error::internal(format!("diary repository error: {message}"))
        }
        DiaryRepositoryError::Closed => Error::internal("diary unit of work is already closed"),
    }
}

fn validate(claims: &IdentityClaims, request: &CreateDiaryRequest) -> Result<(), Error> {
    if claims.user_id.is_nil() {
        return Err(Error::validation("user_id must not be nil"));
    }
    if request.family_id.is_nil() {
        return Err(Error::validation("family_id must not be nil"));
    }
    if request.content.trim().is_empty() {
        return Err(Error::validation("content must not be empty"));
    }
    if request.content.chars().count() > DIARY_CONTENT_MAX_CHARS {
        return Err(Error::validation(format!(
            "content must be at most {DIARY_CONTENT_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> Result<DateTime<Utc>, Error> {
    local
        .checked_sub_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| Error::internal(format!("week boundary {local} is out of range")))
}

/// Diary service implementing [`DiaryCommand`].
pub struct DiaryService<T> {
    transactions: Arc<T>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl<T> DiaryService<T> {
    /// Create a service that computes calendar days in `offset`.
    pub fn new(transactions: Arc<T>, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self {
            transactions,
            clock,
            offset,
        }
    }

    async fn write(
        &self,
        uow: &mut dyn DiaryUnitOfWork,
        claims: &IdentityClaims,
        request: CreateDiaryRequest,
    ) -> Result<CreateDiaryResponse, Error> {
        let now = self.clock.utc();
        let entry = DiaryEntry {
            id: DiaryId::random(),
            user_id: claims.user_id,
            family_id: request.family_id,
            content: request.content,
            created_at: now,
        };
        uow.insert_diary(&entry).await.map_err(map_repository_error)?;

        let today = local_date(now, self.offset);
        let existing = uow
            .lock_streak(&entry.user_id, &entry.family_id)
            .await
            .map_err(map_repository_error)?;
        let transition = advance(entry.user_id, entry.family_id, existing.as_ref(), today);
        if transition.requires_write() {
            uow.upsert_streak(transition.streak(), now)
                .await
                .map_err(map_repository_error)?;
        }

        let (week_start, week_end) = week_range(today);
        let posts_this_week = uow
            .count_entries_between(
                &entry.user_id,
                &entry.family_id,
                local_to_utc(week_start, self.offset)?,
                local_to_utc(week_end, self.offset)?,
            )
            .await
            .map_err(map_repository_error)?;

        let envelope = EventEnvelope::from_event(&DiaryCreatedEvent {
            diary_id: entry.id,
            user_id: entry.user_id,
            family_id: entry.family_id,
            content: entry.content,
            timestamp: now,
        })
        .map_err(|err| Error::internal(format!("failed to encode diary.created: {err}")))?;
        uow.enqueue_outbox(&OutboxMessage::pending(envelope, now))
            .await
            .map_err(map_repository_error)?;

        Ok(CreateDiaryResponse {
            diary_id: entry.id,
            streak: transition.streak().current_streak,
            posts_this_week,
        })
    }
}

#[async_trait]
impl<T> DiaryCommand for DiaryService<T>
where
    T: DiaryTransactionManager,
{
    async fn create_diary(
        &self,
        claims: IdentityClaims,
        request: CreateDiaryRequest,
    ) -> Result<CreateDiaryResponse, Error> {
        validate(&claims, &request)?;

        let mut uow = self
            .transactions
            .begin()
            .await
            .map_err(map_repository_error)?;

        match self.write(uow.as_mut(), &claims, request).await {
            Ok(response) => {
                uow.commit().await.map_err(map_repository_error)?;
                tracing::info!(
                    diary_id = %response.diary_id,
                    user_id = %claims.user_id,
                    streak = response.streak,
                    posts_this_week = response.posts_this_week,
                    "diary created"
                );
                Ok(response)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!(error = %rollback_err, "diary rollback failed");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "diary_service_tests.rs"]
mod tests;
