//! Driven port for the external proofreading service.
//!
//! Only the number of flagged issues feeds the accuracy score, so the port
//! returns the suggestions in a minimal domain shape.

use async_trait::async_trait;

use super::define_port_error;

/// One issue flagged by the proofreading service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProofreadingSuggestion {
    /// Character offset of the flagged span.
    pub offset: u32,
    /// Length of the flagged span in characters.
    pub length: u32,
    /// Explanation supplied by the service.
    pub message: String,
    /// Suggested replacement, if any.
    pub suggestion: String,
    /// Text as it appears in the input.
    pub surface_form: String,
}

define_port_error! {
    /// Errors surfaced while calling the proofreading service.
    pub enum ProofreadingGatewayError {
        /// Network transport failed before receiving a response.
        Transport { message: String } =>
            transient "proofreading transport failed: {message}",
        /// The call exceeded its timeout.
        Timeout { message: String } =>
            transient "proofreading timeout: {message}",
        /// The service rate-limited the request.
        RateLimited { message: String } =>
            transient "proofreading rate limited request: {message}",
        /// The service rejected the request (bad app id, oversized text).
        Rejected { message: String } =>
            "proofreading request rejected: {message}",
        /// The response could not be decoded.
        Decode { message: String } =>
            "proofreading response decode failed: {message}",
    }
}

/// Port for proofreading diary text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProofreadingGateway: Send + Sync {
    /// Return the issues flagged in `text`.
    async fn check(&self, text: &str) -> Result<Vec<ProofreadingSuggestion>, ProofreadingGatewayError>;
}
