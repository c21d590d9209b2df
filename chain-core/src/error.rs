//! Error types for the chain

use thiserror::Error;

/// Result type for chain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Chain errors
#[derive(Error, Debug)]
pub enum Error {
    /// Transfer amount below zero
    #[error("Invalid amount: {0} is negative")]
    InvalidAmount(rust_decimal::Decimal),

    /// Transaction already carries a signature
    #[error("Transaction is already signed")]
    AlreadySigned,

    /// Authenticity or balance check failed at admission
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Ledger was built without a balance mapping
    #[error("Ledger has no configured balances")]
    UninitializedLedger,

    /// Sealing attempted with no pending transactions
    #[error("Cannot aggregate an empty transaction batch")]
    EmptyBatch,

    /// Hasher given a value it cannot encode
    #[error("Unsupported field type: {0}")]
    UnsupportedFieldType(String),

    /// A sealed block would not link to its parent
    #[error("Block link violation: {0}")]
    BlockLinkViolation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may retry with corrected inputs.
    ///
    /// State is untouched on every recoverable path.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InvalidAmount(_) | Error::InvalidTransaction(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_recoverable_kinds() {
        assert!(Error::InvalidTransaction("insufficient funds".into()).is_recoverable());
        assert!(Error::InvalidAmount(Decimal::NEGATIVE_ONE).is_recoverable());
        assert!(!Error::EmptyBatch.is_recoverable());
        assert!(!Error::UninitializedLedger.is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = Error::InvalidAmount(Decimal::new(-5, 0));
        assert_eq!(err.to_string(), "Invalid amount: -5 is negative");
    }
}
