//! PostgreSQL unit of work for the diary write path.
//!
//! A [`DieselDiaryUnitOfWork`] owns one pooled connection with an open
//! transaction. The streak row is read `FOR UPDATE`, so concurrent posts
//! for the same pair serialise on that row. A unit of work dropped without
//! commit returns a connection mid-transaction; the pool's broken-connection
//! check discards it, which aborts the transaction server-side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};

use crate::domain::outbox::OutboxMessage;
use crate::domain::ports::{DiaryRepositoryError, DiaryTransactionManager, DiaryUnitOfWork};
use crate::domain::{DiaryEntry, FamilyId, Streak, UserId};

use super::diesel_basic_error_mapping::{
    count_from_db, count_to_db, map_basic_diesel_error, map_basic_pool_error,
};
use super::models::{NewDiaryRow, NewOutboxRow, NewStreakRow, StreakRow};
use super::pool::DbPool;
use super::schema::{diaries, outbox_messages, streaks};

type OwnedConnection = PooledConnection<'static, AsyncPgConnection>;

fn map_diesel_error(operation: &str) -> impl FnOnce(diesel::result::Error) -> DiaryRepositoryError + '_ {
    move |error| {
        map_basic_diesel_error(
            error,
            operation,
            DiaryRepositoryError::query,
            DiaryRepositoryError::connection,
        )
    }
}

fn row_to_streak(row: StreakRow) -> Result<Streak, DiaryRepositoryError> {
    Ok(Streak {
        user_id: UserId::from_uuid(row.user_id),
        family_id: FamilyId::from_uuid(row.family_id),
        current_streak: count_from_db(row.current_streak, "current_streak")
            .map_err(DiaryRepositoryError::query)?,
        last_post_date: row.last_post_date,
    })
}

/// Opens [`DieselDiaryUnitOfWork`]s on a shared pool.
#[derive(Clone)]
pub struct DieselDiaryTransactionManager {
    pool: DbPool,
}

impl DieselDiaryTransactionManager {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiaryTransactionManager for DieselDiaryTransactionManager {
    async fn begin(&self) -> Result<Box<dyn DiaryUnitOfWork>, DiaryRepositoryError> {
        let mut conn = self
            .pool
            .get_owned()
            .await
            .map_err(|err| map_basic_pool_error(err, DiaryRepositoryError::connection))?;
        <AnsiTransactionManager as TransactionManager<AsyncPgConnection>>::begin_transaction(
            &mut *conn,
        )
        .await
        .map_err(map_diesel_error("begin transaction"))?;
        Ok(Box::new(DieselDiaryUnitOfWork { conn: Some(conn) }))
    }
}

/// One open transaction. Every method fails with
/// [`DiaryRepositoryError::Closed`] after commit or rollback.
pub struct DieselDiaryUnitOfWork {
    conn: Option<OwnedConnection>,
}

impl DieselDiaryUnitOfWork {
    fn conn(&mut self) -> Result<&mut AsyncPgConnection, DiaryRepositoryError> {
        self.conn
            .as_mut()
            .map(|conn| &mut **conn)
            .ok_or_else(DiaryRepositoryError::closed)
    }

    fn take(&mut self) -> Result<OwnedConnection, DiaryRepositoryError> {
        self.conn.take().ok_or_else(DiaryRepositoryError::closed)
    }
}

#[async_trait]
impl DiaryUnitOfWork for DieselDiaryUnitOfWork {
    async fn insert_diary(&mut self, entry: &DiaryEntry) -> Result<(), DiaryRepositoryError> {
        let row = NewDiaryRow {
            id: *entry.id.as_uuid(),
            user_id: *entry.user_id.as_uuid(),
            family_id: *entry.family_id.as_uuid(),
            content: &entry.content,
            created_at: entry.created_at,
        };
        diesel::insert_into(diaries::table)
            .values(&row)
            .execute(self.conn()?)
            .await
            .map(|_| ())
            .map_err(map_diesel_error("insert diary"))
    }

    async fn lock_streak(
        &mut self,
        user_id: &UserId,
        family_id: &FamilyId,
    ) -> Result<Option<Streak>, DiaryRepositoryError> {
        let row = streaks::table
            .filter(
                streaks::user_id
                    .eq(user_id.as_uuid())
                    .and(streaks::family_id.eq(family_id.as_uuid())),
            )
            .select(StreakRow::as_select())
            .for_update()
            .first::<StreakRow>(self.conn()?)
            .await
            .optional()
            .map_err(map_diesel_error("lock streak"))?;

        row.map(row_to_streak).transpose()
    }

    async fn upsert_streak(
        &mut self,
        streak: &Streak,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DiaryRepositoryError> {
        let row = NewStreakRow {
            user_id: *streak.user_id.as_uuid(),
            family_id: *streak.family_id.as_uuid(),
            current_streak: count_to_db(streak.current_streak, "current_streak")
                .map_err(DiaryRepositoryError::query)?,
            last_post_date: streak.last_post_date,
            updated_at,
        };
        diesel::insert_into(streaks::table)
            .values(&row)
            .on_conflict((streaks::user_id, streaks::family_id))
            .do_update()
            .set((
                streaks::current_streak.eq(excluded(streaks::current_streak)),
                streaks::last_post_date.eq(excluded(streaks::last_post_date)),
                streaks::updated_at.eq(excluded(streaks::updated_at)),
            ))
            .execute(self.conn()?)
            .await
            .map(|_| ())
            .map_err(map_diesel_error("upsert streak"))
    }

    async fn count_entries_between(
        &mut self,
        user_id: &UserId,
        family_id: &FamilyId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32, DiaryRepositoryError> {
        let count: i64 = diaries::table
            .filter(
                diaries::user_id
                    .eq(user_id.as_uuid())
                    .and(diaries::family_id.eq(family_id.as_uuid()))
                    .and(diaries::created_at.between(start, end)),
            )
            .count()
            .get_result(self.conn()?)
            .await
            .map_err(map_diesel_error("count weekly entries"))?;

        u32::try_from(count)
            .map_err(|_| DiaryRepositoryError::query(format!("entry count out of range: {count}")))
    }

    async fn enqueue_outbox(&mut self, message: &OutboxMessage) -> Result<(), DiaryRepositoryError> {
        let row = NewOutboxRow {
            id: message.id,
            event_type: &message.envelope.event_type,
            payload: &message.envelope.payload,
            trace_id: message.envelope.trace_id,
            created_at: message.created_at,
            attempts: count_to_db(message.attempts, "attempts")
                .map_err(DiaryRepositoryError::query)?,
        };
        diesel::insert_into(outbox_messages::table)
            .values(&row)
            .execute(self.conn()?)
            .await
            .map(|_| ())
            .map_err(map_diesel_error("enqueue outbox message"))
    }

    async fn commit(&mut self) -> Result<(), DiaryRepositoryError> {
        let mut conn = self.take()?;
        <AnsiTransactionManager as TransactionManager<AsyncPgConnection>>::commit_transaction(
            &mut *conn,
        )
        .await
        .map_err(map_diesel_error("commit transaction"))
    }

    async fn rollback(&mut self) -> Result<(), DiaryRepositoryError> {
        let mut conn = self.take()?;
        <AnsiTransactionManager as TransactionManager<AsyncPgConnection>>::rollback_transaction(
            &mut *conn,
        )
        .await
        .map_err(map_diesel_error("rollback transaction"))
    }
}
