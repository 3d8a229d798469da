//! Error types.
//!
//! Adapter failures never leave the orchestrator; they are turned into
//! fallback results. Only [`AnalysisError`] and [`ConfigError`] reach the
//! caller.

use thiserror::Error;

/// Longest slice of an error response body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Failure of a single provider call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response body: {0}")]
    MalformedBody(String),

    #[error("empty response body")]
    EmptyBody,
}

impl AdapterError {
    /// Map a transport error the way the HTTP call reports it.
    pub fn from_reqwest(err: reqwest::Error, endpoint: &str, timeout_seconds: u64) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout {
                seconds: timeout_seconds,
            }
        } else if err.is_connect() {
            AdapterError::Network(format!("cannot connect to {}", endpoint))
        } else if err.is_decode() {
            AdapterError::MalformedBody(err.to_string())
        } else {
            AdapterError::Network(err.to_string())
        }
    }

    /// Build a status error, truncating long bodies.
    pub fn status(status: u16, body: &str) -> Self {
        let body: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
        AdapterError::Status { status, body }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Network(_) | AdapterError::Timeout { .. } => true,
            AdapterError::Status { status, .. } => *status == 429 || *status >= 500,
            AdapterError::MalformedBody(_) | AdapterError::EmptyBody => false,
        }
    }
}

/// Errors surfaced to the caller of an analysis run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("deal {id} not found")]
    DealNotFound { id: i64 },

    #[error("deal source error: {0}")]
    DealSource(String),
}

/// Configuration problems detected at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no analysis providers are available; set at least one provider credential")]
    NoProvidersAvailable,

    #[error("invalid provider '{name}': {reason}")]
    InvalidProvider { name: String, reason: String },

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_truncated() {
        let body = "x".repeat(1000);
        match AdapterError::status(502, &body) {
            AdapterError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), MAX_ERROR_BODY_CHARS);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AdapterError::Timeout { seconds: 30 }.is_retryable());
        assert!(AdapterError::Network("reset".to_string()).is_retryable());
        assert!(AdapterError::status(429, "slow down").is_retryable());
        assert!(AdapterError::status(503, "").is_retryable());
        assert!(!AdapterError::status(401, "bad key").is_retryable());
        assert!(!AdapterError::EmptyBody.is_retryable());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AdapterError::Timeout { seconds: 30 }.to_string(),
            "request timed out after 30s"
        );
        assert_eq!(
            AnalysisError::DealNotFound { id: 7 }.to_string(),
            "deal 7 not found"
        );
    }
}
