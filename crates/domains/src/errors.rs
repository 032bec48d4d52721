//! # DomainError
//!
//! Centralized error handling for the post engine.
//! Every port returns this type so services can match on the failure kind
//! without knowing which adapter produced it.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Thread, author or post does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// A batch references a parent post that is not in the target thread
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unparseable paging parameters or a malformed new post
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Infrastructure failure (e.g., DB down, pool timeout), with context attached
    #[error("internal service error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }
}

/// A specialized Result type for domain logic.
pub type Result<T> = std::result::Result<T, DomainError>;
