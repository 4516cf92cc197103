//! Tests for the diary creation service.
//!
//! Most cases run against an in-memory store whose unit of work stages
//! changes on a snapshot and publishes them only on commit, so rollback
//! behaviour is observable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, TimeZone, Utc};
use rstest::{fixture, rstest};

use super::*;
use crate::domain::calendar::DEFAULT_UTC_OFFSET_SECONDS;
use crate::domain::events::DIARY_CREATED;
use crate::domain::ports::{MockDiaryTransactionManager, MockDiaryUnitOfWork};
use crate::domain::{ErrorCode, FamilyId, Streak, TraceId, UserId};

#[derive(Debug, Clone, Default)]
struct Store {
    entries: Vec<DiaryEntry>,
    streaks: HashMap<(UserId, FamilyId), Streak>,
    streak_written_at: Vec<DateTime<Utc>>,
    outbox: Vec<OutboxMessage>,
    commits: u32,
    rollbacks: u32,
}

#[derive(Default)]
struct InMemoryTransactions {
    store: Arc<Mutex<Store>>,
    fail_outbox: bool,
}

impl InMemoryTransactions {
    fn snapshot(&self) -> Store {
        self.store.lock().expect("store lock").clone()
    }
}

struct InMemoryUnitOfWork {
    shared: Arc<Mutex<Store>>,
    staged: Store,
    fail_outbox: bool,
}

#[async_trait]
impl DiaryUnitOfWork for InMemoryUnitOfWork {
    async fn insert_diary(&mut self, entry: &DiaryEntry) -> Result<(), DiaryRepositoryError> {
        self.staged.entries.push(entry.clone());
        Ok(())
    }

    async fn lock_streak(
        &mut self,
        user_id: &UserId,
        family_id: &FamilyId,
    ) -> Result<Option<Streak>, DiaryRepositoryError> {
        Ok(self.staged.streaks.get(&(*user_id, *family_id)).copied())
    }

    async fn upsert_streak(
        &mut self,
        streak: &Streak,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DiaryRepositoryError> {
        self.staged
            .streaks
            .insert((streak.user_id, streak.family_id), *streak);
        self.staged.streak_written_at.push(updated_at);
        Ok(())
    }

    async fn count_entries_between(
        &mut self,
        user_id: &UserId,
        family_id: &FamilyId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32, DiaryRepositoryError> {
        let count = self
            .staged
            .entries
            .iter()
            .filter(|entry| {
                entry.user_id == *user_id
                    && entry.family_id == *family_id
                    && entry.created_at >= start
                    && entry.created_at <= end
            })
            .count();
        Ok(u32::try_from(count).expect("count fits"))
    }

    async fn enqueue_outbox(&mut self, message: &OutboxMessage) -> Result<(), DiaryRepositoryError> {
        if self.fail_outbox {
            return Err(DiaryRepositoryError::query("outbox insert failed"));
        }
        self.staged.outbox.push(message.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DiaryRepositoryError> {
        let mut shared = self.shared.lock().expect("store lock");
        let commits = shared.commits + 1;
        let rollbacks = shared.rollbacks;
        *shared = Store {
            commits,
            rollbacks,
            ..self.staged.clone()
        };
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DiaryRepositoryError> {
        self.shared.lock().expect("store lock").rollbacks += 1;
        Ok(())
    }
}

#[async_trait]
impl DiaryTransactionManager for InMemoryTransactions {
    async fn begin(&self) -> Result<Box<dyn DiaryUnitOfWork>, DiaryRepositoryError> {
        Ok(Box::new(InMemoryUnitOfWork {
            shared: Arc::clone(&self.store),
            staged: self.snapshot(),
            fail_outbox: self.fail_outbox,
        }))
    }
}

/// Clock whose current instant can be moved between calls.
struct SteppingClock(Mutex<DateTime<Utc>>);

impl SteppingClock {
    fn set(&self, instant: DateTime<Utc>) {
        *self.0.lock().expect("clock lock") = instant;
    }
}

impl Clock for SteppingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock lock")
    }
}

fn jst() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECONDS).expect("valid offset")
}

/// Noon JST on the given day of January 2026.
fn jan(day: u32) -> DateTime<Utc> {
    jst()
        .with_ymd_and_hms(2026, 1, day, 12, 0, 0)
        .single()
        .expect("valid fixture timestamp")
        .with_timezone(&Utc)
}

struct Harness {
    transactions: Arc<InMemoryTransactions>,
    clock: Arc<SteppingClock>,
    service: DiaryService<InMemoryTransactions>,
    claims: IdentityClaims,
    family_id: FamilyId,
}

impl Harness {
    async fn post_at(&self, instant: DateTime<Utc>) -> CreateDiaryResponse {
        self.clock.set(instant);
        self.service
            .create_diary(
                self.claims.clone(),
                CreateDiaryRequest {
                    family_id: self.family_id,
                    content: "今日は公園に行った。".to_owned(),
                },
            )
            .await
            .expect("diary created")
    }
}

fn harness_with(transactions: InMemoryTransactions) -> Harness {
    let transactions = Arc::new(transactions);
    let clock = Arc::new(SteppingClock(Mutex::new(jan(12))));
    let service = DiaryService::new(
        Arc::clone(&transactions),
        Arc::clone(&clock) as Arc<dyn Clock>,
        jst(),
    );
    Harness {
        transactions,
        clock,
        service,
        claims: IdentityClaims {
            user_id: UserId::random(),
        },
        family_id: FamilyId::random(),
    }
}

#[fixture]
fn harness() -> Harness {
    harness_with(InMemoryTransactions::default())
}

#[rstest]
#[tokio::test]
async fn first_post_creates_streak_and_outbox_row(harness: Harness) {
    let response = harness.post_at(jan(12)).await;

    assert_eq!(response.streak, 1);
    assert_eq!(response.posts_this_week, 1);

    let store = harness.transactions.snapshot();
    assert_eq!(store.commits, 1);
    assert_eq!(store.entries.len(), 1);
    assert_eq!(store.entries[0].id, response.diary_id);
    assert_eq!(store.outbox.len(), 1);
    let outbox = &store.outbox[0];
    assert!(outbox.is_pending());
    assert_eq!(outbox.envelope.event_type, DIARY_CREATED);
    assert_eq!(
        outbox.envelope.payload["diary_id"],
        serde_json::json!(response.diary_id)
    );
}

#[rstest]
#[tokio::test]
async fn streak_extends_on_consecutive_days_and_resets_after_gap(harness: Harness) {
    assert_eq!(harness.post_at(jan(12)).await.streak, 1);
    assert_eq!(harness.post_at(jan(13)).await.streak, 2);
    let after_gap = harness.post_at(jan(15)).await;

    assert_eq!(after_gap.streak, 1);
    assert_eq!(after_gap.posts_this_week, 3);

    let store = harness.transactions.snapshot();
    assert_eq!(store.streaks.len(), 1);
}

#[rstest]
#[tokio::test]
async fn streak_rows_are_stamped_with_the_service_clock(harness: Harness) {
    harness.post_at(jan(12)).await;
    harness.post_at(jan(13)).await;
    harness.post_at(jan(13) + TimeDelta::hours(2)).await;

    let store = harness.transactions.snapshot();
    assert_eq!(store.streak_written_at, vec![jan(12), jan(13)]);
}

#[rstest]
#[tokio::test]
async fn same_day_repost_keeps_streak(harness: Harness) {
    harness.post_at(jan(13)).await;
    let again = harness.post_at(jan(13) + TimeDelta::hours(3)).await;

    assert_eq!(again.streak, 1);
    assert_eq!(again.posts_this_week, 2);
}

#[rstest]
#[tokio::test]
async fn local_midnight_decides_the_calendar_day(harness: Harness) {
    // 2026-01-12 23:30 JST and 2026-01-13 00:30 JST are both 2026-01-12 in UTC.
    let late = jst()
        .with_ymd_and_hms(2026, 1, 12, 23, 30, 0)
        .single()
        .expect("valid timestamp")
        .with_timezone(&Utc);
    harness.post_at(late).await;
    let next = harness.post_at(late + TimeDelta::hours(1)).await;

    assert_eq!(next.streak, 2);
}

#[rstest]
#[tokio::test]
async fn weekly_count_excludes_previous_week(harness: Harness) {
    harness.post_at(jan(11)).await;
    let monday = harness.post_at(jan(12)).await;

    assert_eq!(monday.streak, 2);
    assert_eq!(monday.posts_this_week, 1);
}

#[rstest]
#[tokio::test]
async fn outbox_row_carries_trace_id_in_scope(harness: Harness) {
    let trace_id = TraceId::generate();
    TraceId::scope(trace_id, harness.post_at(jan(12))).await;

    let store = harness.transactions.snapshot();
    assert_eq!(store.outbox[0].envelope.trace_id, Some(*trace_id.as_uuid()));
}

#[tokio::test]
async fn failure_inside_unit_of_work_rolls_back() {
    let harness = harness_with(InMemoryTransactions {
        fail_outbox: true,
        ..InMemoryTransactions::default()
    });

    let err = harness
        .service
        .create_diary(
            harness.claims.clone(),
            CreateDiaryRequest {
                family_id: harness.family_id,
                content: "本文".to_owned(),
            },
        )
        .await
        .expect_err("outbox failure aborts");

    assert_eq!(err.code(), ErrorCode::Internal);
    let store = harness.transactions.snapshot();
    assert_eq!(store.commits, 0);
    assert_eq!(store.rollbacks, 1);
    assert!(store.entries.is_empty());
    assert!(store.streaks.is_empty());
}

#[rstest]
#[case::nil_family(FamilyId::from_uuid(uuid::Uuid::nil()), "日記")]
#[case::blank_content(FamilyId::random(), "   ")]
#[tokio::test]
async fn invalid_requests_never_open_a_transaction(
    #[case] family_id: FamilyId,
    #[case] content: &str,
) {
    let mut transactions = MockDiaryTransactionManager::new();
    transactions.expect_begin().times(0);
    let service = DiaryService::new(
        Arc::new(transactions),
        Arc::new(SteppingClock(Mutex::new(jan(12)))),
        jst(),
    );

    let err = service
        .create_diary(
            IdentityClaims {
                user_id: UserId::random(),
            },
            CreateDiaryRequest {
                family_id,
                content: content.to_owned(),
            },
        )
        .await
        .expect_err("validation fails");

    assert_eq!(err.code(), ErrorCode::Validation);
}

#[tokio::test]
async fn oversized_content_is_rejected() {
    let mut transactions = MockDiaryTransactionManager::new();
    transactions.expect_begin().times(0);
    let service = DiaryService::new(
        Arc::new(transactions),
        Arc::new(SteppingClock(Mutex::new(jan(12)))),
        jst(),
    );

    let err = service
        .create_diary(
            IdentityClaims {
                user_id: UserId::random(),
            },
            CreateDiaryRequest {
                family_id: FamilyId::random(),
                content: "あ".repeat(DIARY_CONTENT_MAX_CHARS + 1),
            },
        )
        .await
        .expect_err("too long");

    assert_eq!(err.code(), ErrorCode::Validation);
}

#[tokio::test]
async fn insert_failure_skips_streak_and_rolls_back() {
    let mut uow = MockDiaryUnitOfWork::new();
    uow.expect_insert_diary()
        .times(1)
        .return_once(|_| Err(DiaryRepositoryError::connection("connection reset")));
    uow.expect_lock_streak().times(0);
    uow.expect_commit().times(0);
    uow.expect_rollback().times(1).return_once(|| Ok(()));

    let mut transactions = MockDiaryTransactionManager::new();
    transactions
        .expect_begin()
        .times(1)
        .return_once(move || Ok(Box::new(uow) as Box<dyn DiaryUnitOfWork>));
    let service = DiaryService::new(
        Arc::new(transactions),
        Arc::new(SteppingClock(Mutex::new(jan(12)))),
        jst(),
    );

    let err = service
        .create_diary(
            IdentityClaims {
                user_id: UserId::random(),
            },
            CreateDiaryRequest {
                family_id: FamilyId::random(),
                content: "本文".to_owned(),
            },
        )
        .await
        .expect_err("insert failure propagates");

    assert_eq!(err.code(), ErrorCode::Internal);
}
