//! # LedgerVault Seal
//!
//! Client-side file encryption and key wrapping.
//!
//! ## Overview
//!
//! Files are sealed with AES-192-GCM under a fresh 24-byte key. The key never
//! leaves the client in the clear: it is wrapped toward a collectively held
//! X25519 public key, and only comes back after the collective re-encrypts it
//! toward a specific reader.
//!
//! ## Key Concepts
//!
//! - **Envelope**: ciphertext plus the `nonce || tag || extra` side channel
//! - **SymmetricKey**: the per-file key, wiped on drop
//! - **WrappedKey**: a key encrypted toward one X25519 public key
//! - **CollectiveKey**: the public half of the collective's long-term secret
//! - **EncryptedKeyHandle**: a key re-encrypted toward a reader
//!
//! ## Usage
//!
//! ```rust
//! use ledgervault_seal::{open, seal};
//!
//! let (envelope, key) = seal(b"quarterly report", None).unwrap();
//! assert_eq!(open(&envelope, &key).unwrap(), b"quarterly report");
//! ```

pub mod collective;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod wrap;

pub use collective::{CollectiveKey, EncryptedKeyHandle};
pub use crypto::{
    EphemeralKeyPair, SharedKey, SymmetricKey, WrapNonce, WrappingKey, X25519PublicKey,
    X25519StaticSecret, SYMMETRIC_KEY_LEN,
};
pub use envelope::{open, seal, seal_with_extra, Envelope, NONCE_LEN, TAG_LEN};
pub use error::{Result, SealError};
pub use wrap::WrappedKey;
