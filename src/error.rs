//! Error taxonomy
//!
//! Every failure in the core is one of five recoverable classes; none is
//! fatal to the process. Gateway errors carry the backend's error string
//! verbatim so it can be logged, while callers surface a generic message
//! to the user.

use thiserror::Error;

/// Core error type.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Missing or malformed required field. The form stays open; the
    /// message names the offending field.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The principal lacks the capability required for the action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The referenced ticket or user no longer exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persistence call failed or returned an unsuccessful flag.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Session provider call failed; session state stays unauthenticated.
    #[error("auth session error: {0}")]
    AuthSession(String),
}

impl Error {
    /// Classifier used by bulk operations when aggregating per-item results.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden(_))
    }
}

/// Core result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_keeps_backend_string() {
        let err = Error::Gateway("E11000 duplicate key".into());
        assert_eq!(err.to_string(), "gateway error: E11000 duplicate key");
    }
}
