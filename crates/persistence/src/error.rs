//! Persistence errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Sheets API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PersistenceError {
    pub fn status(&self) -> Option<u16> {
        match self {
            PersistenceError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Sheets rejected an `addSheet` because the tab now exists
    pub fn is_duplicate_sheet(&self) -> bool {
        matches!(
            self,
            PersistenceError::Api { status: 400, message } if message.contains("already exists")
        )
    }
}

impl From<reqwest::Error> for PersistenceError {
    fn from(err: reqwest::Error) -> Self {
        PersistenceError::Network(err.to_string())
    }
}
