//! Diary analysis use case.
//!
//! Scores each newly created diary entry. A failing proofreading service
//! degrades the score to [`DEFAULT_ACCURACY_SCORE`] instead of failing the
//! message; a failing repository does fail it.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use uuid::Uuid;

use crate::domain::analysis::{
    DEFAULT_ACCURACY_SCORE, DiaryAnalysis, accuracy_score, char_count, sentence_count,
};
use crate::domain::events::DiaryCreatedEvent;
use crate::domain::ports::{
    DiaryAnalysisCommand, DiaryAnalysisRepository, DiaryAnalysisRepositoryError,
    ProofreadingGateway,
};
use crate::domain::Error;

fn map_repository_error(error: DiaryAnalysisRepositoryError) -> Error {
    match error {
        DiaryAnalysisRepositoryError::Connection { message } => {
            Error::internal(format!("diary analysis repository unavailable: {message}"))
        }
        DiaryAnalysisRepositoryError::Query { message } => {
            Error::internal(format!("diary analysis repository error: {message}"))
        }
    }
}

fn validate(event: &DiaryCreatedEvent) -> Result<(), Error> {
    if event.diary_id.is_nil() {
        return Err(Error::validation("diary_id must not be nil"));
    }
    if event.user_id.is_nil() {
        return Err(Error::validation("user_id must not be nil"));
    }
    if event.family_id.is_nil() {
        return Err(Error::validation("family_id must not be nil"));
    }
    if event.content.trim().is_empty() {
        return Err(Error::validation("content must not be empty"));
    }
    Ok(())
}

/// Analysis service implementing [`DiaryAnalysisCommand`].
pub struct DiaryAnalysisService<G, R> {
    gateway: Arc<G>,
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<G, R> DiaryAnalysisService<G, R> {
    /// Create a new analysis service.
    pub fn new(gateway: Arc<G>, repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            repository,
            clock,
        }
    }
}

impl<G, R> DiaryAnalysisService<G, R>
where
    G: ProofreadingGateway,
{
    async fn score(&self, event: &DiaryCreatedEvent) -> u8 {
        match self.gateway.check(&event.content).await {
            Ok(suggestions) => accuracy_score(suggestions.len()),
            Err(err) => {
                tracing::warn!(
                    diary_id = %event.diary_id,
                    error = %err,
                    transient = err.is_transient(),
                    "proofreading failed; using default accuracy score"
                );
                DEFAULT_ACCURACY_SCORE
            }
        }
    }
}

#[async_trait]
impl<G, R> DiaryAnalysisCommand for DiaryAnalysisService<G, R>
where
    G: ProofreadingGateway,
    R: DiaryAnalysisRepository,
{
    async fn analyze(&self, event: DiaryCreatedEvent) -> Result<DiaryAnalysis, Error> {
        validate(&event)?;

        let analysis = DiaryAnalysis {
            id: Uuid::new_v4(),
            diary_id: event.diary_id,
            user_id: event.user_id,
            family_id: event.family_id,
            char_count: char_count(&event.content),
            sentence_count: sentence_count(&event.content),
            accuracy_score: self.score(&event).await,
            created_at: self.clock.utc(),
        };

        self.repository
            .insert(&analysis)
            .await
            .map_err(map_repository_error)?;

        tracing::info!(
            diary_id = %analysis.diary_id,
            char_count = analysis.char_count,
            sentence_count = analysis.sentence_count,
            accuracy_score = analysis.accuracy_score,
            "diary analysed"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
#[path = "analysis_service_tests.rs"]
mod tests;
