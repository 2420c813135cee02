//! Error types for the proteus core library.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The remote profile store could not be reached or refused the caller.
    /// Callers keep working against local state when they see this.
    #[error("Remote profile store unavailable: {0}")]
    RemoteUnavailable(String),

    /// A food entry or profile was rejected before reaching any store.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid date '{0}'. Must be YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
