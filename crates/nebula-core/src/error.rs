//! Error types for Nebula Core
//!
//! The error taxonomy shared by every wallet operation. Transport and storage
//! crates convert their own errors into these variants.

use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Nebula Core errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Recovery phrase failed word-list or checksum validation
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Wrong password, truncated blob or tampered ciphertext
    #[error("Decryption failed: invalid password or corrupted data")]
    DecryptionFailed,

    /// Signing was requested without an unlocked session
    #[error("Session is locked")]
    SessionLocked,

    /// Amount exceeds the known spendable balance
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Address is not a valid 32-byte base58 public key
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Transport or RPC failure
    #[error("Network error: {0}")]
    Network(String),

    /// Operation refused on the production cluster
    #[error("Not supported on mainnet: {0}")]
    NotSupportedOnMainnet(String),

    /// Operation did not complete within its time limit
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Cluster rejected the transaction or it expired unconfirmed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Password does not satisfy minimum requirements
    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    /// Wallet not found
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// Wallet already exists
    #[error("Wallet already exists: {0}")]
    WalletAlreadyExists(String),

    /// Display name rejected
    #[error("Invalid wallet name: {0}")]
    InvalidWalletName(String),

    /// Key derivation error
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Random source failure
    #[error("Randomness unavailable: {0}")]
    Randomness(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if error is a user-facing error (vs internal error)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidMnemonic(_)
                | Error::DecryptionFailed
                | Error::SessionLocked
                | Error::InsufficientFunds(_)
                | Error::InvalidAddress(_)
                | Error::NotSupportedOnMainnet(_)
                | Error::InvalidAmount(_)
                | Error::InvalidPassword(_)
                | Error::WalletNotFound(_)
                | Error::WalletAlreadyExists(_)
                | Error::InvalidWalletName(_)
        )
    }

    /// Errors a caller may retry as-is. Submissions are never retried by the core.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout(_))
    }

    /// Refusals caused by wallet policy rather than bad input or transport
    pub fn is_policy_failure(&self) -> bool {
        matches!(self, Error::SessionLocked | Error::NotSupportedOnMainnet(_))
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidMnemonic(_) => {
                "The recovery phrase is invalid. Please check and try again.".to_string()
            }
            Error::DecryptionFailed => {
                "Invalid password or corrupted wallet data.".to_string()
            }
            Error::SessionLocked => {
                "Your wallet is locked. Please unlock it to continue.".to_string()
            }
            Error::InsufficientFunds(_) => {
                "You don't have enough funds for this transaction. Please check your balance and try again.".to_string()
            }
            Error::InvalidAddress(_) => {
                "The recipient address is invalid. Please check and try again.".to_string()
            }
            Error::Network(_) => {
                "Unable to reach the network. Please check your connection and try again.".to_string()
            }
            Error::NotSupportedOnMainnet(_) => {
                "Airdrops are not available on mainnet.".to_string()
            }
            Error::Timeout(_) => {
                "The network took too long to respond. Please try again.".to_string()
            }
            Error::TransactionFailed(reason) => {
                format!("The transaction was not accepted: {}", reason)
            }
            Error::InvalidAmount(_) => {
                "The amount is invalid. Please enter a valid amount.".to_string()
            }
            Error::InvalidWalletName(reason) => {
                format!("The wallet name is not allowed: {}", reason)
            }
            _ => self.to_string(),
        }
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InsufficientFunds(_) | Error::InvalidAmount(_) => ErrorCategory::Amount,
            Error::InvalidAddress(_) => ErrorCategory::Address,
            Error::DecryptionFailed
            | Error::InvalidPassword(_)
            | Error::KeyDerivation(_)
            | Error::Randomness(_) => ErrorCategory::Keys,
            Error::SessionLocked => ErrorCategory::Session,
            Error::TransactionFailed(_) => ErrorCategory::Transaction,
            Error::Network(_) | Error::Timeout(_) => ErrorCategory::Network,
            Error::NotSupportedOnMainnet(_) => ErrorCategory::Policy,
            Error::Storage(_) | Error::Io(_) => ErrorCategory::Storage,
            Error::InvalidMnemonic(_)
            | Error::WalletNotFound(_)
            | Error::WalletAlreadyExists(_)
            | Error::InvalidWalletName(_) => ErrorCategory::Wallet,
            Error::Config(_) | Error::Serialization(_) | Error::Other(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Amount-related errors
    Amount,
    /// Address-related errors
    Address,
    /// Key and secret handling errors
    Keys,
    /// Session state errors
    Session,
    /// Transaction-related errors
    Transaction,
    /// Network-related errors
    Network,
    /// Cluster policy refusals
    Policy,
    /// Storage-related errors
    Storage,
    /// Wallet-related errors
    Wallet,
    /// Internal/system errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Amount => write!(f, "Amount"),
            ErrorCategory::Address => write!(f, "Address"),
            ErrorCategory::Keys => write!(f, "Keys"),
            ErrorCategory::Session => write!(f, "Session"),
            ErrorCategory::Transaction => write!(f, "Transaction"),
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::Policy => write!(f, "Policy"),
            ErrorCategory::Storage => write!(f, "Storage"),
            ErrorCategory::Wallet => write!(f, "Wallet"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

impl From<nebula_params::Error> for Error {
    fn from(e: nebula_params::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_detection() {
        assert!(Error::InsufficientFunds("test".to_string()).is_user_error());
        assert!(Error::SessionLocked.is_user_error());
        assert!(Error::DecryptionFailed.is_user_error());
        assert!(!Error::Network("test".to_string()).is_user_error());
        assert!(!Error::Storage("test".to_string()).is_user_error());
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Network("reset".to_string()).is_retryable());
        assert!(Error::Timeout("getBalance".to_string()).is_retryable());
        assert!(!Error::TransactionFailed("rejected".to_string()).is_retryable());
        assert!(!Error::SessionLocked.is_retryable());
    }

    #[test]
    fn test_policy_failures() {
        assert!(Error::SessionLocked.is_policy_failure());
        assert!(Error::NotSupportedOnMainnet("airdrop".to_string()).is_policy_failure());
        assert!(!Error::InvalidAddress("x".to_string()).is_policy_failure());
    }

    #[test]
    fn test_decryption_message_is_generic() {
        let msg = Error::DecryptionFailed.to_string();
        assert_eq!(msg, "Decryption failed: invalid password or corrupted data");
    }

    #[test]
    fn test_user_messages() {
        let msg = Error::InsufficientFunds("details".to_string()).user_message();
        assert!(msg.contains("don't have enough funds"));

        let msg = Error::SessionLocked.user_message();
        assert!(msg.contains("locked"));

        let msg = Error::TransactionFailed("blockhash expired".to_string()).user_message();
        assert!(msg.contains("blockhash expired"));
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::InsufficientFunds("test".to_string()).category(),
            ErrorCategory::Amount
        );
        assert_eq!(
            Error::InvalidAddress("test".to_string()).category(),
            ErrorCategory::Address
        );
        assert_eq!(Error::SessionLocked.category(), ErrorCategory::Session);
        assert_eq!(Error::DecryptionFailed.category(), ErrorCategory::Keys);
        assert_eq!(
            Error::Timeout("test".to_string()).category(),
            ErrorCategory::Network
        );
        assert_eq!(
            Error::NotSupportedOnMainnet("airdrop".to_string()).category(),
            ErrorCategory::Policy
        );
        assert_eq!(
            Error::InvalidWalletName("too long".to_string()).category(),
            ErrorCategory::Wallet
        );
        assert!(Error::InvalidWalletName("too long".to_string()).is_user_error());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Amount.to_string(), "Amount");
        assert_eq!(ErrorCategory::Session.to_string(), "Session");
        assert_eq!(ErrorCategory::Network.to_string(), "Network");
    }
}
