//! File key wrapping via X25519 key agreement.
//!
//! A [`WrappedKey`] carries a [`SymmetricKey`] encrypted toward one X25519
//! public key. It is used twice in the read protocol: once toward the
//! collective key when a file is stored, and once toward the reader when the
//! collective re-encrypts.

use serde::{Deserialize, Serialize};

use crate::crypto::{
    EphemeralKeyPair, SymmetricKey, WrapNonce, X25519PublicKey, X25519StaticSecret,
    SYMMETRIC_KEY_LEN,
};
use crate::error::{Result, SealError};

/// A symmetric key encrypted toward a single X25519 recipient.
///
/// The wrapping key is derived from an ephemeral ECDH exchange and bound to a
/// caller-chosen context, so a wrapped key copied onto another object fails
/// to unwrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// Ephemeral X25519 public key (sender's side of ECDH).
    pub ephemeral_public: X25519PublicKey,

    /// The symmetric key, encrypted with the derived wrapping key.
    pub ciphertext: Vec<u8>,

    /// Nonce used for encryption.
    pub nonce: WrapNonce,
}

impl WrappedKey {
    /// Wrap `key` for `recipient`, bound to `context`.
    pub fn wrap(key: &SymmetricKey, recipient: &X25519PublicKey, context: &[u8]) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let wrapping_key = ephemeral
            .diffie_hellman(recipient)
            .derive_wrapping_key(context);

        let nonce = WrapNonce::generate();
        let ciphertext = wrapping_key.encrypt(key.as_bytes(), &nonce)?;

        Ok(Self {
            ephemeral_public,
            ciphertext,
            nonce,
        })
    }

    /// Recover the key with the recipient's secret and the same context.
    pub fn unwrap(&self, recipient: &X25519StaticSecret, context: &[u8]) -> Result<SymmetricKey> {
        let wrapping_key = recipient
            .diffie_hellman(&self.ephemeral_public)
            .derive_wrapping_key(context);

        let mut key_bytes = wrapping_key.decrypt(&self.ciphertext, &self.nonce)?;
        let key = SymmetricKey::from_slice(&key_bytes);
        zeroize::Zeroize::zeroize(&mut key_bytes);

        key.ok_or_else(|| {
            SealError::KeyUnwrap(format!(
                "invalid key length: expected {}, got {}",
                SYMMETRIC_KEY_LEN,
                self.ciphertext.len().saturating_sub(16)
            ))
        })
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| SealError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| SealError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_roundtrip() {
        let recipient = X25519StaticSecret::generate();
        let key = SymmetricKey::generate();

        let wrapped = WrappedKey::wrap(&key, &recipient.public_key(), b"ctx").unwrap();
        let unwrapped = wrapped.unwrap(&recipient, b"ctx").unwrap();

        assert_eq!(key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let recipient = X25519StaticSecret::generate();
        let intruder = X25519StaticSecret::generate();
        let key = SymmetricKey::generate();

        let wrapped = WrappedKey::wrap(&key, &recipient.public_key(), b"ctx").unwrap();

        assert!(matches!(
            wrapped.unwrap(&intruder, b"ctx"),
            Err(SealError::KeyUnwrap(_))
        ));
    }

    #[test]
    fn test_wrong_context_fails() {
        let recipient = X25519StaticSecret::generate();
        let key = SymmetricKey::generate();

        let wrapped = WrappedKey::wrap(&key, &recipient.public_key(), b"object-a").unwrap();

        assert!(wrapped.unwrap(&recipient, b"object-b").is_err());
    }

    #[test]
    fn test_wrapped_key_serialization() {
        let recipient = X25519StaticSecret::generate();
        let key = SymmetricKey::generate();

        let wrapped = WrappedKey::wrap(&key, &recipient.public_key(), b"ctx").unwrap();
        let bytes = wrapped.to_bytes().unwrap();

        assert_eq!(WrappedKey::from_bytes(&bytes).unwrap(), wrapped);
    }
}
