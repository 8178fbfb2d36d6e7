//! Error types

/// Vault persistence errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Vault file could not be interpreted
    #[error("Corrupt vault: {0}")]
    Corrupt(String),

    /// Storage location unavailable
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for nebula_core::Error {
    fn from(e: Error) -> Self {
        nebula_core::Error::Storage(e.to_string())
    }
}
