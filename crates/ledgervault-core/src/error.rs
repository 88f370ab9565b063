//! Error types for LedgerVault core.

use thiserror::Error;

use crate::object::ObjectKind;
use crate::types::InstanceId;

/// Errors from encoding, decoding, and signature checks.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Errors reported by the ledger capability.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger refused the transaction as a whole.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The fee payer cannot cover the fee.
    #[error("insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// The signer is not allowed to perform an operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No object exists with this id.
    #[error("unknown object: {0}")]
    UnknownObject(InstanceId),

    /// An object with this id already exists.
    #[error("object already exists: {0}")]
    AlreadyExists(InstanceId),

    /// The object exists but is of another kind.
    #[error("object {id} is a {found}, expected a {expected}")]
    UnexpectedKind {
        id: InstanceId,
        expected: ObjectKind,
        found: ObjectKind,
    },

    /// A proof could not be produced.
    #[error("proof unavailable: {0}")]
    ProofUnavailable(String),

    /// A proof does not match its contents.
    #[error("invalid proof for {0}")]
    InvalidProof(InstanceId),

    /// Encoding or signature error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

/// Errors reported by the re-encryption capability.
#[derive(Debug, Error)]
pub enum ReencryptError {
    /// The collective refused to re-encrypt for this requester.
    #[error("re-encryption refused: {0}")]
    Refused(String),

    /// The proofs handed to the collective did not check out.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The collective could not be reached or did not reach quorum.
    #[error("collective unavailable: {0}")]
    Unavailable(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
