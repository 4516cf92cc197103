//! Posting streak state machine.
//!
//! A streak counts consecutive calendar days on which a user posted to a
//! family diary. The transition is pure: persistence adapters read the
//! current row, call [`advance`], and upsert the result keyed on
//! `(user_id, family_id)`.

use chrono::NaiveDate;

use crate::domain::{FamilyId, UserId};

/// Persisted streak for one user within one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streak {
    pub user_id: UserId,
    pub family_id: FamilyId,
    /// Consecutive posting days, always at least one.
    pub current_streak: u32,
    pub last_post_date: NaiveDate,
}

impl Streak {
    /// Start a new streak on `date`.
    #[must_use]
    pub fn start(user_id: UserId, family_id: FamilyId, date: NaiveDate) -> Self {
        Self {
            user_id,
            family_id,
            current_streak: 1,
            last_post_date: date,
        }
    }
}

/// Outcome of applying one post to a streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakTransition {
    /// First post for the pair; a new row must be inserted.
    Created(Streak),
    /// Same-day re-entry (or an out-of-order older post); nothing to write.
    Unchanged(Streak),
    /// Posted on the day after the last post.
    Extended(Streak),
    /// Posted after a gap of at least one day; the count restarts.
    Reset(Streak),
}

impl StreakTransition {
    /// Streak state after the transition.
    #[must_use]
    pub const fn streak(&self) -> &Streak {
        match self {
            Self::Created(streak)
            | Self::Unchanged(streak)
            | Self::Extended(streak)
            | Self::Reset(streak) => streak,
        }
    }

    /// Whether the transition must be persisted.
    #[must_use]
    pub const fn requires_write(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }
}

/// Apply a post made on `date` to the existing streak, if any.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use diary_backend::domain::{advance_streak, FamilyId, StreakTransition, UserId};
///
/// let day1 = NaiveDate::from_ymd_opt(2026, 1, 12).expect("valid date");
/// let first = advance_streak(UserId::random(), FamilyId::random(), None, day1);
/// assert!(matches!(first, StreakTransition::Created(s) if s.current_streak == 1));
/// ```
#[must_use]
pub fn advance(
    user_id: UserId,
    family_id: FamilyId,
    existing: Option<&Streak>,
    date: NaiveDate,
) -> StreakTransition {
    let Some(current) = existing else {
        return StreakTransition::Created(Streak::start(user_id, family_id, date));
    };

    if current.last_post_date >= date {
        return StreakTransition::Unchanged(*current);
    }

    if current.last_post_date.succ_opt() == Some(date) {
        StreakTransition::Extended(Streak {
            current_streak: current.current_streak.saturating_add(1),
            last_post_date: date,
            ..*current
        })
    } else {
        StreakTransition::Reset(Streak {
            current_streak: 1,
            last_post_date: date,
            ..*current
        })
    }
}
