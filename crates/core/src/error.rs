//! Error types

use thiserror::Error;

/// Result alias using the core error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced across crate boundaries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Caller passed a value of the wrong shape (e.g. a non-string message)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Whether the error is the caller's fault rather than a downstream failure
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}
