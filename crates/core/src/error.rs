use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("no data directory available for history storage")]
    NoDataDir,
    #[error("failed to persist {path:?}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Classified failure of a lifecycle query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("no usable API credential is configured")]
    CredentialMissing,
    #[error("API quota exhausted")]
    QuotaExhausted,
    #[error("model unavailable")]
    ModelUnavailable,
    #[error("{0}")]
    Unknown(String),
}

impl QueryError {
    /// Message shown to the user when a query ends in this error.
    pub fn user_message(&self) -> String {
        match self {
            QueryError::CredentialMissing => "No API key is configured. Set one with --api-key, \
                 LIFECYCLE_API_KEY, or the `key` shell command."
                .to_string(),
            QueryError::QuotaExhausted => "The API quota for this key has been exhausted. \
                 Configure your own API key or try again later."
                .to_string(),
            QueryError::ModelUnavailable => {
                "The lifecycle model is currently unavailable. Please try again later.".to_string()
            }
            QueryError::Unknown(message) if message.trim().is_empty() => {
                "An unexpected error occurred.".to_string()
            }
            QueryError::Unknown(message) => message.clone(),
        }
    }

    /// Errors the user fixes by configuring a (different) API key.
    pub fn needs_credential(&self) -> bool {
        matches!(
            self,
            QueryError::CredentialMissing | QueryError::QuotaExhausted
        )
    }
}
