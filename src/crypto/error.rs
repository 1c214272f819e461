//! Cryptographic error types

use thiserror::Error;

/// Errors that can occur while sealing or opening relay payloads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Encryption operation failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed - authentication tag mismatch (wrong key or tampered data)
    #[error("Decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    /// The sealed payload is not valid base64 or is too short
    #[error("Invalid sealed payload encoding: {0}")]
    InvalidEncoding(String),
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
