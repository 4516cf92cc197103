//! Internal Diesel row structs.
//!
//! These types never leave the persistence layer.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{diaries, diary_analyses, outbox_messages, streaks};

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = diaries)]
pub(crate) struct NewDiaryRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub family_id: Uuid,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = streaks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StreakRow {
    pub user_id: Uuid,
    pub family_id: Uuid,
    pub current_streak: i32,
    pub last_post_date: NaiveDate,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = streaks)]
pub(crate) struct NewStreakRow {
    pub user_id: Uuid,
    pub family_id: Uuid,
    pub current_streak: i32,
    pub last_post_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = diary_analyses)]
pub(crate) struct NewDiaryAnalysisRow {
    pub id: Uuid,
    pub diary_id: Uuid,
    pub user_id: Uuid,
    pub family_id: Uuid,
    pub char_count: i32,
    pub sentence_count: i32,
    pub accuracy_score: i16,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Outbox models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = outbox_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct OutboxRow {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub trace_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = outbox_messages)]
pub(crate) struct NewOutboxRow<'a> {
    pub id: Uuid,
    pub event_type: &'a str,
    pub payload: &'a serde_json::Value,
    pub trace_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub attempts: i32,
}
