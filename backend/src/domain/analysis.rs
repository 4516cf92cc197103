//! Diary analysis records and the text metrics they are built from.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{DiaryId, FamilyId, UserId};

/// Score assigned when the proofreading gateway cannot be reached.
pub const DEFAULT_ACCURACY_SCORE: u8 = 100;

const PENALTY_PER_SUGGESTION: u32 = 10;

/// Characters that terminate a sentence in Japanese or Latin text.
const SENTENCE_TERMINATORS: [char; 6] = ['。', '！', '？', '!', '?', '.'];

/// Insert-only analysis result for one diary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryAnalysis {
    pub id: Uuid,
    pub diary_id: DiaryId,
    pub user_id: UserId,
    pub family_id: FamilyId,
    pub char_count: u32,
    pub sentence_count: u32,
    /// Within `0..=100`.
    pub accuracy_score: u8,
    pub created_at: DateTime<Utc>,
}

/// Number of Unicode scalar values in `content`.
#[must_use]
pub fn char_count(content: &str) -> u32 {
    u32::try_from(content.chars().count()).unwrap_or(u32::MAX)
}

/// Number of sentence-terminal punctuation marks in `content`.
///
/// # Examples
/// ```
/// use diary_backend::domain::sentence_count;
///
/// assert_eq!(sentence_count("最初の文。次の文。三番目の文。"), 3);
/// assert_eq!(sentence_count("句点がない"), 0);
/// ```
#[must_use]
pub fn sentence_count(content: &str) -> u32 {
    let count = content
        .chars()
        .filter(|c| SENTENCE_TERMINATORS.contains(c))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Accuracy score for a given number of proofreading suggestions.
///
/// Each suggestion costs ten points; the score never drops below zero.
///
/// # Examples
/// ```
/// use diary_backend::domain::accuracy_score;
///
/// assert_eq!(accuracy_score(0), 100);
/// assert_eq!(accuracy_score(5), 50);
/// assert_eq!(accuracy_score(15), 0);
/// ```
#[must_use]
pub fn accuracy_score(suggestion_count: usize) -> u8 {
    let count = u32::try_from(suggestion_count).unwrap_or(u32::MAX);
    let penalty = count.saturating_mul(PENALTY_PER_SUGGESTION);
    let score = u32::from(DEFAULT_ACCURACY_SCORE).saturating_sub(penalty);
    u8::try_from(score).unwrap_or(0)
}
