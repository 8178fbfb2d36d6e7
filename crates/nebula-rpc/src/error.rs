//! Error types for ledger RPC

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// RPC errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure not originating from the HTTP client
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON-RPC error object returned by the node
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Node-supplied message
        message: String,
    },

    /// Response did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Request exceeded its time limit
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl Error {
    /// Whether the node itself rejected the request
    pub fn is_node_rejection(&self) -> bool {
        matches!(self, Error::Rpc { .. })
    }
}

impl From<Error> for nebula_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Timeout(op) => nebula_core::Error::Timeout(op),
            Error::Http(err) if err.is_timeout() => nebula_core::Error::Timeout(err.to_string()),
            other => nebula_core::Error::Network(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
