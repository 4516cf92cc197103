//! Port for persisting diary analysis results.

use async_trait::async_trait;

use crate::domain::DiaryAnalysis;

use super::define_port_error;

define_port_error! {
    /// Errors raised by diary analysis repository adapters.
    pub enum DiaryAnalysisRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            transient "diary analysis repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "diary analysis repository query failed: {message}",
    }
}

/// Insert-only store for [`DiaryAnalysis`] rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiaryAnalysisRepository: Send + Sync {
    /// Persist a new analysis row.
    async fn insert(&self, analysis: &DiaryAnalysis) -> Result<(), DiaryAnalysisRepositoryError>;
}
