//! Handler for `diary.created` deliveries.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::events::{DIARY_CREATED, DiaryCreatedEvent};
use crate::domain::ports::DiaryAnalysisCommand;

use super::EventHandler;
use super::handler::{decode_or_drop, drop_permanent};

/// Feeds `diary.created` events into the analysis use case.
///
/// Validation failures are dropped like any other permanent error; only
/// storage failures are redelivered.
pub struct DiaryAnalysisHandler<C> {
    command: Arc<C>,
}

impl<C> DiaryAnalysisHandler<C> {
    /// Create a handler for `command`.
    pub fn new(command: Arc<C>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl<C> EventHandler for DiaryAnalysisHandler<C>
where
    C: DiaryAnalysisCommand,
{
    async fn handle(&self, body: &[u8]) -> Result<(), Error> {
        let Some(event) = decode_or_drop::<DiaryCreatedEvent>(body, DIARY_CREATED) else {
            return Ok(());
        };
        let diary_id = event.diary_id;
        tracing::debug!(%diary_id, "analysing diary");
        let outcome = self.command.analyze(event).await.map(|_| ());
        drop_permanent(outcome, DIARY_CREATED)
    }
}
