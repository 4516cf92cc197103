//! Trace identifier correlating a diary write with the messages it causes.
//!
//! `TraceId` is the only context value carried implicitly. It lives in a
//! typed task-local slot rather than a string-keyed map so producers and
//! consumers cannot disagree on the lookup key. The broker adapters copy it
//! into the [`TRACE_ID_HEADER`] message header on publish and restore it
//! around handler execution on consume.
//!
//! Tokio task-local variables are not inherited across spawned tasks. Use
//! [`TraceId::scope`] when spawning new tasks to keep the identifier in
//! scope.

use std::future::Future;

use tokio::task_local;
use uuid::Uuid;

/// Message header that carries the trace identifier across the broker.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

task_local! {
    static TRACE_ID: TraceId;
}

/// Per-operation trace identifier exposed via task-local storage.
///
/// # Examples
/// ```
/// use diary_backend::domain::TraceId;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let trace_id: TraceId = "00000000-0000-0000-0000-000000000000"
///     .parse()
///     .expect("valid UUID");
/// let observed = TraceId::scope(trace_id, async move { TraceId::current() }).await;
/// assert_eq!(observed, Some(trace_id));
/// # });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Generate a new random trace identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct a trace identifier from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the current trace identifier if one is in scope.
    #[must_use]
    pub fn current() -> Option<Self> {
        TRACE_ID.try_with(|id| *id).ok()
    }

    /// Return the identifier in scope, or a fresh one when none is.
    #[must_use]
    pub fn current_or_generate() -> Self {
        Self::current().unwrap_or_else(Self::generate)
    }

    /// Access the inner UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Execute the provided future with the supplied trace identifier in scope.
    pub async fn scope<Fut>(trace_id: TraceId, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        TRACE_ID.scope(trace_id, fut).await
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;

    #[tokio::test]
    async fn current_reflects_scope() {
        let expected = TraceId::generate();
        let observed = TraceId::scope(expected, async move { TraceId::current() }).await;
        assert_eq!(observed, Some(expected));
    }

    #[tokio::test]
    async fn current_is_none_out_of_scope() {
        assert!(TraceId::current().is_none());
    }

    #[tokio::test]
    async fn current_or_generate_prefers_scoped_value() {
        let expected = TraceId::generate();
        let observed = TraceId::scope(expected, async { TraceId::current_or_generate() }).await;
        assert_eq!(observed, expected);
    }

    #[test]
    fn from_str_accepts_padded_header_values() {
        let trace_id: TraceId = " 00000000-0000-0000-0000-000000000000 "
            .parse()
            .expect("parse uuid");
        assert_eq!(trace_id.as_uuid(), &Uuid::nil());
    }

    #[test]
    fn from_str_rejects_garbage() {
        assert!("not-a-uuid".parse::<TraceId>().is_err());
    }
}
