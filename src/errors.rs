//! Domain error taxonomy
//!
//! Every fallible operation returns `DomainError`; the GraphQL layer maps it
//! to a field error with a machine-readable extension code. Nothing retries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Bad arguments, malformed payload, failed uniqueness precondition.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Entity absent in the system it was looked up in.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate create or a forbidden transition per state guard.
    #[error("{0}")]
    Conflict(String),

    /// Non-2xx or transport failure from any external call.
    #[error("upstream call failed: {0}")]
    Io(String),
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidInput(_) => "INVALID_INPUT",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::Conflict(_) => "CONFLICT",
            DomainError::Io(_) => "IO",
        }
    }

    /// Non-2xx upstream response, surfaced with the remote status and body.
    pub fn upstream(what: &str, status: reqwest::StatusCode, body: &str) -> Self {
        DomainError::Io(format!("{} {}: {}", what, status, body))
    }
}

impl From<reqwest::Error> for DomainError {
    fn from(err: reqwest::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(err: rusqlite::Error) -> Self {
        DomainError::Io(format!("mirror db: {}", err))
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Io(format!("malformed payload: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(DomainError::InvalidInput("x".into()).code(), "INVALID_INPUT");
        assert_eq!(DomainError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(DomainError::Conflict("x".into()).code(), "CONFLICT");
        assert_eq!(DomainError::Io("x".into()).code(), "IO");
    }

    #[test]
    fn upstream_includes_status_and_body() {
        let err = DomainError::upstream(
            "GET /values",
            reqwest::StatusCode::FORBIDDEN,
            "quota exceeded",
        );
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("quota exceeded"));
    }
}
