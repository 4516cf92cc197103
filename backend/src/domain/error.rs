//! Domain-level error types.
//!
//! These errors are transport agnostic. Inbound message handlers inspect the
//! [`ErrorCode`] to decide whether a delivery is dropped as poison or handed
//! back to the broker for redelivery.

use std::fmt;

use crate::domain::TraceId;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Caller or event data is malformed.
    Validation,
    /// A referenced resource (for example a mail template) does not exist.
    NotFound,
    /// Storage or infrastructure failure.
    Internal,
    /// A downstream HTTP dependency failed.
    ExternalApi,
    /// Invalid internal configuration, such as a missing collaborator.
    Logic,
}

impl ErrorCode {
    /// Machine-readable code used in structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::NotFound => "not_found",
            Self::Internal => "internal_error",
            Self::ExternalApi => "external_api_error",
            Self::Logic => "logic_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
///
/// The trace identifier in scope at construction time is captured so a log
/// line emitted far from the failure still correlates with the message that
/// caused it.
///
/// # Examples
/// ```
/// use diary_backend::domain::{Error, ErrorCode};
///
/// let err = Error::not_found("template welcome/fr not found");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// assert!(err.is_permanent());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    code: ErrorCode,
    message: String,
    trace_id: Option<String>,
}

/// Validation errors emitted by the constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorValidationError {
    EmptyMessage,
}

impl fmt::Display for ErrorValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "error message must not be empty"),
        }
    }
}

impl std::error::Error for ErrorValidationError {}

impl Error {
    /// Create a new error, panicking if validation fails.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        match Self::try_new(code, message) {
            Ok(value) => value,
            Err(err) => panic!("error messages must satisfy validation: {err}"),
        }
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(code: ErrorCode, message: impl Into<String>) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            trace_id: TraceId::current().map(|id| id.to_string()),
        })
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Trace identifier captured when the error was built, if any.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Whether the failure is deterministic for the same input.
    ///
    /// Permanent failures will fail identically on redelivery, so message
    /// handlers drop them instead of requeueing.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::Validation | ErrorCode::NotFound | ErrorCode::Logic
        )
    }

    /// Convenience constructor for [`ErrorCode::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Convenience constructor for [`ErrorCode::ExternalApi`] wrapping the cause.
    pub fn external_api(message: impl Into<String>, cause: &dyn std::error::Error) -> Self {
        Self::new(
            ErrorCode::ExternalApi,
            format!("{}: {cause}", message.into()),
        )
    }

    /// Convenience constructor for [`ErrorCode::Logic`].
    pub fn logic(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Logic, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}
