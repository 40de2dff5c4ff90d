//! Error types for the collector.

use std::path::PathBuf;

use char_graph_core::ErrorInfo;
use thiserror::Error;

/// Result type alias for collector operations.
pub type CollectorResult<T> = Result<T, CollectorError>;

/// Errors that abort a collector operation.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// A required credential is not configured.
    #[error("missing credential: {name} is not set")]
    MissingCredential { name: String },

    /// A collection parameter is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A snapshot file exists but does not match the snapshot schema.
    #[error("invalid snapshot {path}: {message}")]
    InvalidSnapshot { path: PathBuf, message: String },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file operations).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectorError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Classified failure of a single sampling call.
///
/// These never abort a run; the runner turns them into error records.
#[derive(Debug, Clone, Error)]
pub enum SamplingError {
    /// The service refused the request because of rate limits.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// The service answered with a non-success status.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Anything else raised by the sampler.
    #[error("{0}")]
    Other(String),
}

impl SamplingError {
    /// Stable class name written to `RunRecord.error.type`.
    pub fn kind(&self) -> &'static str {
        match self {
            SamplingError::RateLimited { .. } => "rate_limited",
            SamplingError::Api { .. } => "api_error",
            SamplingError::Transport(_) => "transport",
            SamplingError::MalformedResponse(_) => "malformed_response",
            SamplingError::Other(_) => "other",
        }
    }

    /// HTTP status, when the service returned one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            SamplingError::RateLimited { .. } => Some(429),
            SamplingError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a retry might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SamplingError::RateLimited { .. } | SamplingError::Transport(_) => true,
            SamplingError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<&SamplingError> for ErrorInfo {
    fn from(err: &SamplingError) -> Self {
        ErrorInfo::new(err.kind(), err.to_string()).with_http_status(err.http_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_from_sampling_error() {
        let err = SamplingError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        let info = ErrorInfo::from(&err);

        assert_eq!(info.kind, "api_error");
        assert_eq!(info.http_status, Some(503));
        assert!(info.message.contains("overloaded"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_malformed_is_not_transient() {
        let err = SamplingError::MalformedResponse("no choices".into());
        assert!(!err.is_transient());
        assert_eq!(err.http_status(), None);
    }
}
