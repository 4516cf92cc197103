//! Domain types, pure engines, use cases, and ports.
//!
//! Purpose: keep diary, streak, analysis, and mail rules free of broker,
//! database, and SMTP concerns. Adapters in `inbound` and `outbound` reach
//! the domain only through [`ports`].
//!
//! Public surface:
//! - Error / ErrorCode: failure reported by every use case, with a
//!   permanence classification used by message handlers.
//! - TraceId: task-local correlation id propagated through message headers.
//! - Streak engine ([`advance_streak`]) and text metrics
//!   ([`sentence_count`], [`accuracy_score`]).
//! - Services: [`DiaryService`], [`DiaryAnalysisService`],
//!   [`mail::MailService`], [`OutboxRelay`].

pub mod analysis;
mod analysis_service;
pub mod calendar;
pub mod diary;
mod diary_service;
pub mod error;
pub mod events;
mod ids;
pub mod mail;
pub mod outbox;
mod outbox_relay;
pub mod ports;
pub mod streak;
pub mod trace_id;

pub use self::analysis::{
    DEFAULT_ACCURACY_SCORE, DiaryAnalysis, accuracy_score, char_count, sentence_count,
};
pub use self::analysis_service::DiaryAnalysisService;
pub use self::calendar::{DEFAULT_UTC_OFFSET_SECONDS, local_date, week_range};
pub use self::diary::{DIARY_CONTENT_MAX_CHARS, DiaryEntry, IdentityClaims};
pub use self::diary_service::DiaryService;
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::ids::{DiaryId, FamilyId, UserId};
pub use self::outbox::OutboxMessage;
pub use self::outbox_relay::{
    DEFAULT_BATCH_SIZE, DEFAULT_POLL_INTERVAL, OutboxRelay, OutboxRelayConfig, RelayReport,
};
pub use self::streak::{Streak, StreakTransition, advance as advance_streak};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
