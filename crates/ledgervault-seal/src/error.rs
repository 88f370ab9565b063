//! Error types for the seal module.

use thiserror::Error;

/// Errors that can occur while sealing, opening, or wrapping keys.
#[derive(Debug, Error)]
pub enum SealError {
    /// Authenticated decryption failed: wrong key, corrupted ciphertext,
    /// tampered tag, or a malformed side channel.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// A wrapped key could not be recovered with the given secret.
    #[error("key unwrap failed: {0}")]
    KeyUnwrap(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SealError {
    /// Whether this error is an authenticated-decryption failure.
    pub fn is_integrity(&self) -> bool {
        matches!(self, SealError::Integrity(_))
    }
}

/// Result type for seal operations.
pub type Result<T> = std::result::Result<T, SealError>;
