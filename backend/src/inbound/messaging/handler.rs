//! Event handler contract and shared outcome classification.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::domain::Error;

/// Decodes one message body and drives a use case.
///
/// Returning `Ok` acknowledges the delivery. Returning `Err` asks for
/// redelivery, so handlers convert poison messages (undecodable bodies,
/// permanent use-case errors) into `Ok` after logging them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one message body.
    async fn handle(&self, body: &[u8]) -> Result<(), Error>;
}

/// Decode a JSON body, logging and returning `None` when it is malformed.
pub(super) fn decode_or_drop<E: DeserializeOwned>(body: &[u8], event_type: &str) -> Option<E> {
    match serde_json::from_slice(body) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::error!(
                event_type,
                error = %err,
                body_len = body.len(),
                "dropping undecodable message"
            );
            None
        }
    }
}

/// Drop permanent failures, keep transient ones for redelivery.
pub(super) fn drop_permanent(result: Result<(), Error>, event_type: &str) -> Result<(), Error> {
    match result {
        Err(err) if err.is_permanent() => {
            tracing::error!(
                event_type,
                code = %err.code(),
                error = %err.message(),
                "dropping message after permanent failure"
            );
            Ok(())
        }
        other => other,
    }
}
