//! Error types for the vault.

use std::time::Duration;

use ledgervault_core::{LedgerError, ReencryptError};
use ledgervault_seal::SealError;
use thiserror::Error;

/// Errors that can occur during vault operations.
///
/// Nothing here is retried internally; the caller decides.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A file with this name is already indexed or queued.
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// A local lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Authenticated decryption failed. Never retry with the same key.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// The ledger rejected a commit.
    #[error("transaction failed: {0}")]
    Transaction(#[source] LedgerError),

    /// A proof could not be obtained or did not check out.
    #[error("proof error: {0}")]
    Proof(#[source] LedgerError),

    /// The collective refused or failed to re-encrypt.
    #[error("re-encryption error: {0}")]
    Reencryption(#[from] ReencryptError),

    /// The collective did not answer in time.
    #[error("re-encryption timed out after {0:?}")]
    Timeout(Duration),

    /// Other ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[source] LedgerError),

    /// Encryption or serialization error.
    #[error("seal error: {0}")]
    Seal(#[source] SealError),
}

impl From<SealError> for VaultError {
    fn from(e: SealError) -> Self {
        match e {
            SealError::Integrity(msg) | SealError::KeyUnwrap(msg) => VaultError::Integrity(msg),
            other => VaultError::Seal(other),
        }
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
