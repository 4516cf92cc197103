//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly.

diesel::table! {
    /// Diary entries, one per post.
    diaries (id) {
        id -> Uuid,
        user_id -> Uuid,
        family_id -> Uuid,
        content -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Posting streak per `(user_id, family_id)`.
    streaks (user_id, family_id) {
        user_id -> Uuid,
        family_id -> Uuid,
        current_streak -> Int4,
        /// Local calendar date of the most recent counted post.
        last_post_date -> Date,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Insert-only analysis results.
    diary_analyses (id) {
        id -> Uuid,
        diary_id -> Uuid,
        user_id -> Uuid,
        family_id -> Uuid,
        char_count -> Int4,
        sentence_count -> Int4,
        accuracy_score -> Int2,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Events awaiting publication by the relay.
    outbox_messages (id) {
        id -> Uuid,
        event_type -> Varchar,
        payload -> Jsonb,
        trace_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        attempts -> Int4,
        last_error -> Nullable<Text>,
        sent_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(diaries, streaks, diary_analyses, outbox_messages);
