//! Error types for the access kernel.
//!
//! Every failure is fatal to the operation that raised it. The kernel does
//! not roll back partial writes itself; the surrounding ledger discards the
//! write set of a failed transaction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error classification surfaced at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    AuthorizationError,
    AlreadyInitializedError,
    AlreadyExistsError,
    NotFoundError,
    ValidationError,
    DecodeError,
    UnknownOperation,
    NotEvaluable,
    StoreError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthorizationError => "AuthorizationError",
            ErrorKind::AlreadyInitializedError => "AlreadyInitializedError",
            ErrorKind::AlreadyExistsError => "AlreadyExistsError",
            ErrorKind::NotFoundError => "NotFoundError",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::UnknownOperation => "UnknownOperation",
            ErrorKind::NotEvaluable => "NotEvaluable",
            ErrorKind::StoreError => "StoreError",
        }
    }
}

/// Errors raised by kernel operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Ownership or organization-scope check failed.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// `init` was called after the contract was already initialized.
    #[error("contract already initialized")]
    AlreadyInitialized,

    /// Create hit a key that already has content.
    #[error("key {0:?} already has content")]
    AlreadyExists(String),

    /// Fetch hit an absent or empty key, or a named sub-record is missing.
    #[error("no content for {0:?}")]
    NotFound(String),

    /// Malformed or missing arguments.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// Stored bytes exist but do not decode as the expected record.
    #[error("malformed record at {key:?}: {reason}")]
    Decode { key: String, reason: String },

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// A mutating operation was sent down the read-only evaluate path.
    #[error("operation {0} mutates state and cannot be evaluated")]
    NotEvaluable(String),

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(String),
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::Authorization(_) => ErrorKind::AuthorizationError,
            AccessError::AlreadyInitialized => ErrorKind::AlreadyInitializedError,
            AccessError::AlreadyExists(_) => ErrorKind::AlreadyExistsError,
            AccessError::NotFound(_) => ErrorKind::NotFoundError,
            AccessError::Validation(_) => ErrorKind::ValidationError,
            AccessError::Decode { .. } => ErrorKind::DecodeError,
            AccessError::UnknownOperation(_) => ErrorKind::UnknownOperation,
            AccessError::NotEvaluable(_) => ErrorKind::NotEvaluable,
            AccessError::Store(_) => ErrorKind::StoreError,
        }
    }

    /// True for the absent-key failure the traversal is allowed to swallow.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessError::NotFound(_))
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_boundary_contract() {
        assert_eq!(
            AccessError::Authorization("x".into()).kind().as_str(),
            "AuthorizationError"
        );
        assert_eq!(
            AccessError::AlreadyInitialized.kind().as_str(),
            "AlreadyInitializedError"
        );
        assert_eq!(
            AccessError::NotFound("ORG".into()).kind(),
            ErrorKind::NotFoundError
        );
    }

    #[test]
    fn kind_serializes_as_plain_name() {
        let json = serde_json::to_string(&ErrorKind::ValidationError).unwrap();
        assert_eq!(json, "\"ValidationError\"");
    }
}
