//! Driving port for scoring newly created diary entries.

use async_trait::async_trait;

use crate::domain::events::DiaryCreatedEvent;
use crate::domain::{DiaryAnalysis, Error};

/// Analyse one diary entry and persist the result.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiaryAnalysisCommand: Send + Sync {
    /// Compute text metrics and an accuracy score, then store them.
    async fn analyze(&self, event: DiaryCreatedEvent) -> Result<DiaryAnalysis, Error>;
}
