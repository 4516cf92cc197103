//! Transaction-manager port for the diary write path.
//!
//! Creating a diary touches three tables: the entry itself, the streak row
//! for `(user_id, family_id)`, and the outbox. The use case drives the
//! sequence through a [`DiaryUnitOfWork`] so that all three commit or none
//! do, while the streak decision itself stays in the domain.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::outbox::OutboxMessage;
use crate::domain::{DiaryEntry, FamilyId, Streak, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by diary persistence adapters.
    pub enum DiaryRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            transient "diary repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "diary repository query failed: {message}",
        /// The unit of work was used after commit or rollback.
        Closed =>
            "diary unit of work is already closed",
    }
}

/// One open database transaction for a diary write.
///
/// Dropping a unit of work without calling [`DiaryUnitOfWork::commit`]
/// must leave no changes behind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiaryUnitOfWork: Send {
    /// Insert a new diary entry.
    async fn insert_diary(&mut self, entry: &DiaryEntry) -> Result<(), DiaryRepositoryError>;

    /// Read the streak for a pair, locking the row until the transaction ends.
    async fn lock_streak(
        &mut self,
        user_id: &UserId,
        family_id: &FamilyId,
    ) -> Result<Option<Streak>, DiaryRepositoryError>;

    /// Insert or update the streak keyed on `(user_id, family_id)`, stamping
    /// the row with `updated_at`.
    async fn upsert_streak(
        &mut self,
        streak: &Streak,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DiaryRepositoryError>;

    /// Count the pair's entries created within `[start, end]`.
    async fn count_entries_between(
        &mut self,
        user_id: &UserId,
        family_id: &FamilyId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32, DiaryRepositoryError>;

    /// Append a message to the outbox.
    async fn enqueue_outbox(&mut self, message: &OutboxMessage) -> Result<(), DiaryRepositoryError>;

    /// Commit every change made through this unit of work.
    async fn commit(&mut self) -> Result<(), DiaryRepositoryError>;

    /// Discard every change made through this unit of work.
    async fn rollback(&mut self) -> Result<(), DiaryRepositoryError>;
}

/// Port for opening diary units of work.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiaryTransactionManager: Send + Sync {
    /// Begin a new transaction.
    async fn begin(&self) -> Result<Box<dyn DiaryUnitOfWork>, DiaryRepositoryError>;
}
