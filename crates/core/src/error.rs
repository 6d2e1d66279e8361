//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / concurrent write).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The resource a write was about to create already exists
    /// (unique identity constraint).
    #[error("already exists: {0}")]
    AlreadyExists(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether this failure means the write it guarded has already happened.
    ///
    /// Retried cross-context writes treat this as success.
    pub fn is_idempotent_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_already_exists_is_an_idempotent_conflict() {
        assert!(DomainError::already_exists("provider profile").is_idempotent_conflict());
        assert!(!DomainError::conflict("stale version").is_idempotent_conflict());
        assert!(!DomainError::not_found().is_idempotent_conflict());
    }

    #[test]
    fn display_includes_detail() {
        let err = DomainError::already_exists("provider profile for user 42");
        assert_eq!(err.to_string(), "already exists: provider profile for user 42");
    }
}
