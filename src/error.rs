//! Error taxonomy for upstream source calls.
//!
//! Everything crossing the `SourceAdapter` boundary is classified into
//! `SourceError` so the health governor can apply the right backoff policy.
//! Nothing in this crate propagates a `SourceError` past the fan-out engine.

use thiserror::Error;

/// Classified failure of a single upstream call.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited (429){}", retry_after.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("upstream server error ({status})")]
    Upstream { status: u16 },

    #[error("no team or match found")]
    NotFound,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl SourceError {
    /// HTTP-ish status code used by the health governor's backoff policy.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SourceError::RateLimited { .. } => Some(429),
            SourceError::Upstream { status } => Some(*status),
            _ => None,
        }
    }

    /// Classify a reqwest failure.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                429 => SourceError::RateLimited { retry_after: None },
                s if s >= 500 => SourceError::Upstream { status: s },
                404 => SourceError::NotFound,
                s => SourceError::Network(format!("unexpected status {}", s)),
            }
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            SourceError::RateLimited { retry_after: Some(8) }.status_code(),
            Some(429)
        );
        assert_eq!(SourceError::Upstream { status: 503 }.status_code(), Some(503));
        assert_eq!(SourceError::Timeout.status_code(), None);
        assert_eq!(SourceError::NotFound.status_code(), None);
    }

    #[test]
    fn test_display_includes_retry_after() {
        let e = SourceError::RateLimited { retry_after: Some(30) };
        assert!(e.to_string().contains("retry after 30s"));
    }
}
