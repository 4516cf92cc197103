//! Driving port for writing diary entries.
//!
//! The HTTP layer authenticates the caller and passes the resulting
//! [`IdentityClaims`] alongside the request body.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{DiaryId, Error, FamilyId, IdentityClaims};

/// Request body for creating a diary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDiaryRequest {
    pub family_id: FamilyId,
    pub content: String,
}

/// Result of a committed diary write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDiaryResponse {
    pub diary_id: DiaryId,
    /// Streak length after this entry.
    pub streak: u32,
    /// Entries by this user in this family during the current ISO week,
    /// including this one.
    pub posts_this_week: u32,
}

/// Port for creating diary entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiaryCommand: Send + Sync {
    /// Persist an entry, advance the streak, and enqueue `diary.created`.
    async fn create_diary(
        &self,
        claims: IdentityClaims,
        request: CreateDiaryRequest,
    ) -> Result<CreateDiaryResponse, Error>;
}
