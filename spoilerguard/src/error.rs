//! Error type shared by every component.
//!
//! Errors are `Clone` because a single in-flight lookup result is handed to
//! every caller that joined it (see [`crate::cache::LookupCache`]).

use thiserror::Error;

/// Errors produced by lookups, the request governor and persistence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpoilerError {
    /// An external provider (metadata or episode listing) failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider does not know the requested item or container.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request governor was closed during teardown.
    #[error("request governor closed")]
    GovernorClosed,

    /// The computation another caller was waiting on was dropped before it finished.
    #[error("lookup abandoned before completion")]
    LookupAbandoned,

    /// The settings store could not be read or written.
    #[error("settings store error: {0}")]
    Store(String),

    /// The persisted document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SpoilerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SpoilerError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Result type alias for spoilerguard operations.
pub type SpoilerResult<T> = Result<T, SpoilerError>;
