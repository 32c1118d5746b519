//! Errors raised by pure account and transfer rules.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A rule in this crate refused a value or a state change.
///
/// Storage and transport failures are reported by the layers that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Caller-supplied input was rejected (names, amounts, opening balance).
    #[error("invalid request: {0}")]
    Validation(String),

    /// A balance change would leave an account negative or overflow it.
    #[error("balance rule violated: {0}")]
    InvariantViolation(String),

    /// An account id or number could not be parsed.
    #[error("malformed identifier: {0}")]
    InvalidId(String),

    /// The account changed since it was read.
    #[error("stale account version: expected {expected}, found {actual}")]
    StaleVersion { expected: u64, actual: u64 },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
