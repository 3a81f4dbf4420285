//! Error types for RiderGo.

use std::time::Duration;

/// Top-level error type for the client core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failures reported by a backend collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {reason}")]
    Network { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("Request to {endpoint} failed ({status}): {message}")]
    Http {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Not signed in")]
    Unauthorized,

    #[error("Request to {endpoint} was cancelled")]
    Cancelled { endpoint: String },
}

/// Fieldless discriminant of [`ApiError`].
///
/// Kept on the verification session so a front end can surface the real
/// cause of a failure even when it shows a generic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Network,
    Timeout,
    Http,
    InvalidResponse,
    Unauthorized,
    Cancelled,
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Network { .. } => ApiErrorKind::Network,
            Self::Timeout { .. } => ApiErrorKind::Timeout,
            Self::Http { .. } => ApiErrorKind::Http,
            Self::InvalidResponse { .. } => ApiErrorKind::InvalidResponse,
            Self::Unauthorized => ApiErrorKind::Unauthorized,
            Self::Cancelled { .. } => ApiErrorKind::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Message the backend attached to a rejected request, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Http { message, .. } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }
}

/// Verification workflow errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Submission is disabled in stage {stage}")]
    SubmissionDisabled { stage: String },

    #[error("A request is already in flight")]
    InFlight,

    #[error("Cannot go from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Failed to send verification code: {0}")]
    IssueCode(#[source] ApiError),

    #[error("Verification failed: {0}")]
    Verify(#[source] ApiError),

    #[error("Verification view was torn down")]
    TornDown,
}

/// Result type alias for the client core.
pub type Result<T> = std::result::Result<T, Error>;
