//! Error types for Google Calendar backend operations.

use std::fmt;
use thiserror::Error;

/// The category of a backend error.
///
/// This enum provides a high-level classification of errors for use in
/// tool-surface responses and retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GcalErrorCode {
    /// Caller input fails a precondition.
    Validation,
    /// Access token rejected or refresh credential invalid/expired/revoked.
    Authentication,
    /// Authorization failed - caller lacks permission (403).
    Forbidden,
    /// Resource not found (404).
    NotFound,
    /// Request was invalid (400) or otherwise rejected by the remote.
    BadRequest,
    /// Rate limit exceeded (429).
    RateLimited,
    /// Remote server error (5xx).
    Server,
    /// Transport-level error - connection failed, timeout, DNS resolution.
    Network,
    /// Unparseable response from the remote.
    InvalidResponse,
    /// Missing or invalid configuration.
    Configuration,
    /// A series split trimmed the original but failed to create the
    /// successor, leaving the two-step mutation half applied.
    PartialFailure,
    /// Internal error - unexpected state, bug.
    Internal,
}

impl GcalErrorCode {
    /// Returns true if this error is transient and the remote call may be
    /// retried.
    ///
    /// Only rate limiting and remote 5xx responses qualify; transport
    /// failures propagate immediately so they are never mistaken for
    /// remote backpressure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Server)
    }

    /// Returns a human-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::RateLimited => "rate_limited",
            Self::Server => "server_error",
            Self::Network => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::Configuration => "configuration",
            Self::PartialFailure => "partial_failure",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for GcalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error from the Google Calendar backend.
#[derive(Debug, Error)]
pub struct GcalError {
    /// The error code categorizing this error.
    code: GcalErrorCode,
    /// A human-readable message describing the error.
    message: String,
    /// The underlying cause of this error, if any.
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GcalError {
    /// Creates a new error with the given code and message.
    pub fn new(code: GcalErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::Validation, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::Authentication, message)
    }

    /// Creates an authorization error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::Forbidden, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::NotFound, message)
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::BadRequest, message)
    }

    /// Creates a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::Server, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::Network, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::InvalidResponse, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::Configuration, message)
    }

    /// Creates a partial failure error.
    pub fn partial_failure(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::PartialFailure, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(GcalErrorCode::Internal, message)
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> GcalErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for GcalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

// Malformed temporal or recurrence input is a caller problem.

impl From<calbridge_core::TimePayloadError> for GcalError {
    fn from(error: calbridge_core::TimePayloadError) -> Self {
        Self::validation(error.to_string())
    }
}

impl From<calbridge_core::RruleError> for GcalError {
    fn from(error: calbridge_core::RruleError) -> Self {
        Self::validation(error.to_string())
    }
}

/// A specialized Result type for backend operations.
pub type GcalResult<T> = Result<T, GcalError>;
