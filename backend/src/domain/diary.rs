//! Diary entries and the identity they are written under.

use chrono::{DateTime, Utc};

use crate::domain::{DiaryId, FamilyId, UserId};

/// Upper bound on diary body length, in Unicode scalar values.
pub const DIARY_CONTENT_MAX_CHARS: usize = 10_000;

/// Validated identity claims supplied by the authentication layer.
///
/// The HTTP layer verifies the bearer token and hands the claims over
/// explicitly; use cases never look identity up from ambient context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub user_id: UserId,
}

/// A persisted diary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryEntry {
    pub id: DiaryId,
    pub user_id: UserId,
    pub family_id: FamilyId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
