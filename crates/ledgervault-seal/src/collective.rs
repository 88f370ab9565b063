//! Collective key and re-encrypted key handles.
//!
//! A file key is first wrapped toward the collective public key, which no
//! single party can open. To read, the collective re-encrypts it toward the
//! requester, producing an [`EncryptedKeyHandle`] that only the requester's
//! secret unwraps.

use serde::{Deserialize, Serialize};

use crate::crypto::{SymmetricKey, X25519PublicKey, X25519StaticSecret};
use crate::error::Result;
use crate::wrap::WrappedKey;

/// Public description of a collectively held key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveKey {
    /// Identifier of the long-term secret held by the collective.
    pub id: [u8; 32],

    /// The collective public key.
    pub public: X25519PublicKey,
}

impl CollectiveKey {
    /// Create a collective key description.
    pub const fn new(id: [u8; 32], public: X25519PublicKey) -> Self {
        Self { id, public }
    }

    /// Wrapping context for a file key stored under `policy`.
    pub fn context(&self, policy: &[u8]) -> Vec<u8> {
        let mut ctx = Vec::with_capacity(9 + 32 + policy.len());
        ctx.extend_from_slice(b"lts-write");
        ctx.extend_from_slice(&self.id);
        ctx.extend_from_slice(policy);
        ctx
    }

    /// Encrypt a file key toward the collective.
    pub fn encrypt_key(&self, key: &SymmetricKey, policy: &[u8]) -> Result<WrappedKey> {
        WrappedKey::wrap(key, &self.public, &self.context(policy))
    }
}

/// A file key re-encrypted toward one requester.
///
/// Opaque until [`unwrap`](Self::unwrap)ped with the requester's secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyHandle {
    /// The read request this handle answers.
    pub read_id: [u8; 32],

    wrapped: WrappedKey,
}

impl EncryptedKeyHandle {
    fn context(read_id: &[u8; 32]) -> Vec<u8> {
        let mut ctx = Vec::with_capacity(10 + 32);
        ctx.extend_from_slice(b"lts-reencr");
        ctx.extend_from_slice(read_id);
        ctx
    }

    /// Re-encrypt `key` toward `requester` for the read request `read_id`.
    ///
    /// Called by whoever holds the recovered key on the collective side.
    pub fn reencrypt(
        key: &SymmetricKey,
        requester: &X25519PublicKey,
        read_id: [u8; 32],
    ) -> Result<Self> {
        let wrapped = WrappedKey::wrap(key, requester, &Self::context(&read_id))?;
        Ok(Self { read_id, wrapped })
    }

    /// Recover the file key with the requester's secret.
    pub fn unwrap(&self, requester: &X25519StaticSecret) -> Result<SymmetricKey> {
        self.wrapped.unwrap(requester, &Self::context(&self.read_id))
    }
}
