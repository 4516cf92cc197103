//! End-to-end event flow without external infrastructure.
//!
//! A diary write lands in an in-memory store, the outbox relay hands the
//! envelope to a capturing publisher, and the captured message is fed back
//! through the consumer dispatch path into the analysis use case.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use rstest::{fixture, rstest};
use uuid::Uuid;

use diary_backend::domain::events::{DIARY_CREATED, EventEnvelope};
use diary_backend::domain::ports::{
    CreateDiaryRequest, DiaryAnalysisRepository, DiaryAnalysisRepositoryError, DiaryCommand,
    DiaryRepositoryError, DiaryTransactionManager, DiaryUnitOfWork, EventPublisher,
    EventPublisherError, OutboxRepository, OutboxRepositoryError, ProofreadingGateway,
    ProofreadingGatewayError, ProofreadingSuggestion,
};
use diary_backend::domain::{
    DEFAULT_UTC_OFFSET_SECONDS, DiaryAnalysis, DiaryAnalysisService, DiaryEntry, DiaryService,
    FamilyId, IdentityClaims, OutboxMessage, OutboxRelay, OutboxRelayConfig, Streak, TraceId,
    UserId,
};
use diary_backend::inbound::messaging::{
    DeliveryAcker, DiaryAnalysisHandler, InboundDelivery, RedeliveryPolicy, Settlement,
    SettlementError, dispatch,
};

// ---------------------------------------------------------------------------
// In-memory infrastructure
// ---------------------------------------------------------------------------

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default, Clone)]
struct Tables {
    entries: Vec<DiaryEntry>,
    streaks: Vec<Streak>,
    outbox: Vec<OutboxMessage>,
}

#[derive(Default, Clone)]
struct Database {
    tables: Arc<Mutex<Tables>>,
}

impl Database {
    fn outbox(&self) -> Vec<OutboxMessage> {
        self.tables.lock().expect("tables lock").outbox.clone()
    }
}

struct UnitOfWork {
    shared: Arc<Mutex<Tables>>,
    staged: Tables,
}

#[async_trait]
impl DiaryUnitOfWork for UnitOfWork {
    async fn insert_diary(&mut self, entry: &DiaryEntry) -> Result<(), DiaryRepositoryError> {
        self.staged.entries.push(entry.clone());
        Ok(())
    }

    async fn lock_streak(
        &mut self,
        user_id: &UserId,
        family_id: &FamilyId,
    ) -> Result<Option<Streak>, DiaryRepositoryError> {
        Ok(self
            .staged
            .streaks
            .iter()
            .find(|s| s.user_id == *user_id && s.family_id == *family_id)
            .copied())
    }

    async fn upsert_streak(
        &mut self,
        streak: &Streak,
        _updated_at: DateTime<Utc>,
    ) -> Result<(), DiaryRepositoryError> {
        self.staged
            .streaks
            .retain(|s| !(s.user_id == streak.user_id && s.family_id == streak.family_id));
        self.staged.streaks.push(*streak);
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
            .filter(|e| e.user_id == *user_id && e.family_id == *family_id)
            .filter(|e| e.created_at >= start && e.created_at <= end)
            .count();
        Ok(u32::try_from(count).expect("small count"))
    }

    async fn enqueue_outbox(&mut self, message: &OutboxMessage) -> Result<(), DiaryRepositoryError> {
        self.staged.outbox.push(message.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DiaryRepositoryError> {
        *self.shared.lock().expect("tables lock") = std::mem::take(&mut self.staged);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DiaryRepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl DiaryTransactionManager for Database {
    async fn begin(&self) -> Result<Box<dyn DiaryUnitOfWork>, DiaryRepositoryError> {
        let staged = self.tables.lock().expect("tables lock").clone();
        Ok(Box::new(UnitOfWork {
            shared: Arc::clone(&self.tables),
            staged,
        }))
    }
}

#[async_trait]
impl OutboxRepository for Database {
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<OutboxMessage>, OutboxRepositoryError> {
        let mut pending: Vec<_> = self
            .outbox()
            .into_iter()
            .filter(OutboxMessage::is_pending)
            .collect();
        pending.sort_by_key(|m| m.created_at);
        pending.truncate(usize::try_from(limit).expect("limit fits"));
        Ok(pending)
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<(), OutboxRepositoryError> {
        let mut tables = self.tables.lock().expect("tables lock");
        if let Some(row) = tables.outbox.iter_mut().find(|m| m.id == id) {
            row.sent_at = Some(sent_at);
        }
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, message: &str) -> Result<(), OutboxRepositoryError> {
        let mut tables = self.tables.lock().expect("tables lock");
        if let Some(row) = tables.outbox.iter_mut().find(|m| m.id == id) {
            row.attempts += 1;
            row.last_error = Some(message.to_owned());
        }
        Ok(())
    }
}

/// Captures published envelopes; fails while `down` is set.
#[derive(Default)]
struct CapturingPublisher {
    published: Mutex<Vec<EventEnvelope>>,
    down: Mutex<bool>,
}

impl CapturingPublisher {
    fn set_down(&self, down: bool) {
        *self.down.lock().expect("down lock") = down;
    }

    fn take(&self) -> Vec<EventEnvelope> {
        std::mem::take(&mut *self.published.lock().expect("published lock"))
    }
}

#[async_trait]
impl EventPublisher for CapturingPublisher {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), EventPublisherError> {
        if *self.down.lock().expect("down lock") {
            return Err(EventPublisherError::transport("broker unreachable"));
        }
        self.published
            .lock()
            .expect("published lock")
            .push(envelope.clone());
        Ok(())
    }
}

/// Flags a fixed number of issues and remembers the trace it ran under.
struct StubGateway {
    issues: usize,
    seen_traces: Mutex<Vec<Option<TraceId>>>,
}

#[async_trait]
impl ProofreadingGateway for StubGateway {
    async fn check(
        &self,
        _text: &str,
    ) -> Result<Vec<ProofreadingSuggestion>, ProofreadingGatewayError> {
        self.seen_traces
            .lock()
            .expect("trace lock")
            .push(TraceId::current());
        Ok(vec![ProofreadingSuggestion::default(); self.issues])
    }
}

#[derive(Default)]
struct AnalysisTable {
    rows: Mutex<Vec<DiaryAnalysis>>,
    failing: Mutex<bool>,
}

#[async_trait]
impl DiaryAnalysisRepository for AnalysisTable {
    async fn insert(&self, analysis: &DiaryAnalysis) -> Result<(), DiaryAnalysisRepositoryError> {
        if *self.failing.lock().expect("failing lock") {
            return Err(DiaryAnalysisRepositoryError::connection("database restarting"));
        }
        self.rows.lock().expect("rows lock").push(analysis.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingAcker {
    calls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl DeliveryAcker for RecordingAcker {
    async fn ack(&self) -> Result<(), SettlementError> {
        self.calls.lock().expect("calls lock").push("ack");
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> Result<(), SettlementError> {
        let call = if requeue { "requeue" } else { "dead-letter" };
        self.calls.lock().expect("calls lock").push(call);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

type Analyzer = DiaryAnalysisHandler<DiaryAnalysisService<StubGateway, AnalysisTable>>;

struct Pipeline {
    database: Database,
    diaries: DiaryService<Database>,
    relay: OutboxRelay<Database, CapturingPublisher>,
    publisher: Arc<CapturingPublisher>,
    gateway: Arc<StubGateway>,
    analyses: Arc<AnalysisTable>,
    analyzer: Analyzer,
}

impl Pipeline {
    /// Turn a captured envelope into the delivery a consumer would see.
    fn delivery(envelope: &EventEnvelope, delivery_count: u32) -> InboundDelivery {
        InboundDelivery {
            routing_key: envelope.event_type.clone(),
            body: envelope.body().expect("encode body"),
            delivery_count,
            trace_id: envelope.trace_id.map(TraceId::from_uuid),
        }
    }
}

#[fixture]
fn pipeline() -> Pipeline {
    let now = Utc
        .with_ymd_and_hms(2026, 1, 12, 3, 0, 0)
        .single()
        .expect("valid time");
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
    let offset = chrono::FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECONDS).expect("offset");

    let database = Database::default();
    let publisher = Arc::new(CapturingPublisher::default());
    let gateway = Arc::new(StubGateway {
        issues: 2,
        seen_traces: Mutex::new(Vec::new()),
    });
    let analyses = Arc::new(AnalysisTable::default());

    Pipeline {
        diaries: DiaryService::new(Arc::new(database.clone()), Arc::clone(&clock), offset),
        relay: OutboxRelay::new(
            Arc::new(database.clone()),
            Arc::clone(&publisher),
            Arc::clone(&clock),
            OutboxRelayConfig::default(),
        ),
        analyzer: DiaryAnalysisHandler::new(Arc::new(DiaryAnalysisService::new(
            Arc::clone(&gateway),
            Arc::clone(&analyses),
            clock,
        ))),
        database,
        publisher,
        gateway,
        analyses,
    }
}

async fn write_diary(pipeline: &Pipeline, trace: TraceId) -> diary_backend::domain::DiaryId {
    let request = CreateDiaryRequest {
        family_id: FamilyId::random(),
        content: "今日は公園に行った。楽しかった。".to_owned(),
    };
    let claims = IdentityClaims {
        user_id: UserId::random(),
    };
    TraceId::scope(trace, pipeline.diaries.create_diary(claims, request))
        .await
        .expect("diary created")
        .diary_id
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[rstest]
#[tokio::test]
async fn diary_write_flows_through_relay_into_analysis(pipeline: Pipeline) {
    let trace = TraceId::generate();
    let diary_id = write_diary(&pipeline, trace).await;

    let report = pipeline.relay.relay_batch().await.expect("relay pass");
    assert_eq!(report.published, 1);
    assert!(pipeline.database.outbox().iter().all(|m| !m.is_pending()));

    let envelopes = pipeline.publisher.take();
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].event_type, DIARY_CREATED);
    assert_eq!(envelopes[0].trace_id, Some(*trace.as_uuid()));

    let acker = RecordingAcker::default();
    let settlement = dispatch(
        &pipeline.analyzer,
        Pipeline::delivery(&envelopes[0], 0),
        &acker,
        RedeliveryPolicy::unbounded(),
    )
    .await;

    assert_eq!(settlement, Settlement::Ack);
    assert_eq!(*acker.calls.lock().expect("calls lock"), vec!["ack"]);
    let rows = pipeline.analyses.rows.lock().expect("rows lock");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].diary_id, diary_id);
    assert_eq!(rows[0].accuracy_score, 80);
    assert_eq!(rows[0].sentence_count, 2);
    assert_eq!(
        *pipeline.gateway.seen_traces.lock().expect("trace lock"),
        vec![Some(trace)]
    );
}

#[rstest]
#[tokio::test]
async fn broker_outage_keeps_rows_pending_until_recovery(pipeline: Pipeline) {
    write_diary(&pipeline, TraceId::generate()).await;
    pipeline.publisher.set_down(true);

    let stalled = pipeline.relay.relay_batch().await.expect("relay pass");
    assert!(stalled.stalled);
    assert_eq!(stalled.published, 0);
    let pending = pipeline.database.outbox();
    assert!(pending[0].is_pending());
    assert_eq!(pending[0].attempts, 1);

    pipeline.publisher.set_down(false);
    let recovered = pipeline.relay.relay_batch().await.expect("relay pass");
    assert_eq!(recovered.published, 1);
    assert_eq!(pipeline.publisher.take().len(), 1);
}

#[rstest]
#[tokio::test]
async fn poison_message_is_acked_without_analysis(pipeline: Pipeline) {
    let acker = RecordingAcker::default();
    let delivery = InboundDelivery {
        routing_key: DIARY_CREATED.to_owned(),
        body: b"{not json".to_vec(),
        delivery_count: 0,
        trace_id: None,
    };

    let settlement = dispatch(
        &pipeline.analyzer,
        delivery,
        &acker,
        RedeliveryPolicy::bounded(3),
    )
    .await;

    assert_eq!(settlement, Settlement::Ack);
    assert!(pipeline.analyses.rows.lock().expect("rows lock").is_empty());
    assert!(pipeline.gateway.seen_traces.lock().expect("trace lock").is_empty());
}

#[rstest]
#[case::first_attempt(0, Settlement::Requeue, "requeue")]
#[case::second_attempt(1, Settlement::Requeue, "requeue")]
#[case::last_attempt(2, Settlement::DeadLetter, "dead-letter")]
#[tokio::test]
async fn storage_failures_requeue_until_dead_lettered(
    pipeline: Pipeline,
    #[case] delivery_count: u32,
    #[case] expected: Settlement,
    #[case] call: &str,
) {
    write_diary(&pipeline, TraceId::generate()).await;
    pipeline.relay.relay_batch().await.expect("relay pass");
    let envelope = pipeline.publisher.take().remove(0);
    *pipeline.analyses.failing.lock().expect("failing lock") = true;

    let acker = RecordingAcker::default();
    let settlement = dispatch(
        &pipeline.analyzer,
        Pipeline::delivery(&envelope, delivery_count),
        &acker,
        RedeliveryPolicy::bounded(3),
    )
    .await;

    assert_eq!(settlement, expected);
    assert_eq!(*acker.calls.lock().expect("calls lock"), vec![call]);
}
