//! Fetch failures and their classification.

use thiserror::Error;

use crate::resilience::ErrorClass;

/// Raw failure of a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    /// The wallet refused to sign the request payload.
    #[error("signature rejected by wallet")]
    SignatureRejected,

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Status { status: 401 | 403, .. } | Self::SignatureRejected => ErrorClass::Authentication,
            _ => ErrorClass::Transient,
        }
    }

    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::Status { status: 304, .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Terminal failure of a read or mutation, after retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("authentication failed: {source}")]
    Authentication { source: FetchError },

    #[error("failed after {attempts} attempt(s): {source}")]
    Transient { attempts: u32, source: FetchError },
}

impl QueryError {
    pub(crate) fn from_attempt(source: FetchError, attempts: u32) -> Self {
        match source.classify() {
            ErrorClass::Authentication => Self::Authentication { source },
            ErrorClass::Transient => Self::Transient { attempts, source },
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Authentication { .. } => ErrorClass::Authentication,
            Self::Transient { .. } => ErrorClass::Transient,
        }
    }

    /// Failure of the last attempt.
    pub fn fetch_error(&self) -> &FetchError {
        match self {
            Self::Authentication { source } | Self::Transient { source, .. } => source,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Authentication { .. } => 1,
            Self::Transient { attempts, .. } => *attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(FetchError::status(401, "").classify(), ErrorClass::Authentication);
        assert_eq!(FetchError::status(403, "").classify(), ErrorClass::Authentication);
        assert_eq!(FetchError::SignatureRejected.classify(), ErrorClass::Authentication);
        assert_eq!(FetchError::status(500, "").classify(), ErrorClass::Transient);
        assert_eq!(FetchError::status(304, "").classify(), ErrorClass::Transient);
        assert_eq!(FetchError::status(404, "").classify(), ErrorClass::Transient);
        assert_eq!(FetchError::Timeout.classify(), ErrorClass::Transient);
        assert_eq!(FetchError::Network("reset".into()).classify(), ErrorClass::Transient);
    }

    #[test]
    fn test_not_modified() {
        assert!(FetchError::status(304, "").is_not_modified());
        assert!(!FetchError::status(500, "").is_not_modified());
    }

    #[test]
    fn test_terminal_error_keeps_last_attempt() {
        let err = QueryError::from_attempt(FetchError::status(502, "bad gateway"), 4);
        assert_eq!(err.class(), ErrorClass::Transient);
        assert_eq!(err.attempts(), 4);
        assert_eq!(err.fetch_error().status_code(), Some(502));
        assert_eq!(err.to_string(), "failed after 4 attempt(s): HTTP 502: bad gateway");
    }
}
