//! Sealed file envelope.
//!
//! A file is encrypted with AES-192-GCM under a fresh 24-byte key and a fresh
//! 16-byte nonce. The envelope carries the ciphertext plus a side channel laid
//! out as:
//!
//! ```text
//! nonce (16) || tag (16) || extra data (optional, any length)
//! ```
//!
//! The extra data is bound to the ciphertext as associated data, so changing
//! any byte of the side channel makes [`open`] fail.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{AesGcm, Nonce, Tag};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::SymmetricKey;
use crate::error::{Result, SealError};

/// AES-192-GCM with a 128-bit nonce and a 128-bit tag.
type Aes192Gcm = AesGcm<Aes192, U16>;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 16;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// A sealed file: ciphertext plus the `nonce || tag || extra` side channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The encrypted data (without the tag).
    pub ciphertext: Vec<u8>,

    /// `nonce || tag || [extra]`.
    side_channel: Vec<u8>,
}

impl Envelope {
    /// Rebuild an envelope from its wire parts.
    ///
    /// The side channel is not validated here; a malformed one makes
    /// [`open`] fail closed.
    pub fn from_parts(ciphertext: Vec<u8>, side_channel: Vec<u8>) -> Self {
        Self {
            ciphertext,
            side_channel,
        }
    }

    /// The raw side channel bytes.
    pub fn side_channel(&self) -> &[u8] {
        &self.side_channel
    }

    /// The nonce, if the side channel is long enough to hold one.
    pub fn nonce(&self) -> Option<&[u8]> {
        self.side_channel.get(..NONCE_LEN)
    }

    /// The authentication tag, if present.
    pub fn tag(&self) -> Option<&[u8]> {
        self.side_channel.get(NONCE_LEN..NONCE_LEN + TAG_LEN)
    }

    /// Extra data appended after the tag, if any.
    pub fn extra_data(&self) -> Option<&[u8]> {
        match self.side_channel.get(NONCE_LEN + TAG_LEN..) {
            Some(extra) if !extra.is_empty() => Some(extra),
            _ => None,
        }
    }

    /// Mutable access to the ciphertext and side channel.
    ///
    /// Only useful for corrupting envelopes in tests.
    #[doc(hidden)]
    pub fn raw_parts_mut(&mut self) -> (&mut Vec<u8>, &mut Vec<u8>) {
        (&mut self.ciphertext, &mut self.side_channel)
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

/// Seal `plaintext`.
///
/// Uses `key` when it is exactly 24 bytes; otherwise a fresh key is drawn.
/// The returned key is the only way to open the envelope; the caller owns its
/// confidentiality from here on.
pub fn seal(plaintext: &[u8], key: Option<&[u8]>) -> Result<(Envelope, SymmetricKey)> {
    seal_with_extra(plaintext, key, None)
}

/// Seal `plaintext`, appending `extra` to the side channel.
pub fn seal_with_extra(
    plaintext: &[u8],
    key: Option<&[u8]>,
    extra: Option<&[u8]>,
) -> Result<(Envelope, SymmetricKey)> {
    let key = key
        .and_then(SymmetricKey::from_slice)
        .unwrap_or_else(SymmetricKey::generate);

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes192Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| SealError::Encryption(e.to_string()))?;

    let aad = extra.unwrap_or_default();
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::<U16>::from_slice(&nonce), aad, &mut buffer)
        .map_err(|e| SealError::Encryption(e.to_string()))?;

    let mut side_channel = Vec::with_capacity(NONCE_LEN + TAG_LEN + aad.len());
    side_channel.extend_from_slice(&nonce);
    side_channel.extend_from_slice(tag.as_slice());
    side_channel.extend_from_slice(aad);

    Ok((Envelope::from_parts(buffer, side_channel), key))
}

/// Open an envelope with its key.
///
/// Fails with [`SealError::Integrity`] if the tag does not verify or the side
/// channel is too short. No plaintext is returned on failure.
pub fn open(envelope: &Envelope, key: &SymmetricKey) -> Result<Vec<u8>> {
    let (nonce, tag) = match (envelope.nonce(), envelope.tag()) {
        (Some(nonce), Some(tag)) => (nonce, tag),
        _ => {
            return Err(SealError::Integrity(format!(
                "side channel is {} bytes, need at least {}",
                envelope.side_channel.len(),
                NONCE_LEN + TAG_LEN
            )))
        }
    };
    let aad = envelope.extra_data().unwrap_or_default();

    let cipher = Aes192Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| SealError::Integrity(e.to_string()))?;

    let mut buffer = envelope.ciphertext.clone();
    match cipher.decrypt_in_place_detached(
        Nonce::<U16>::from_slice(nonce),
        aad,
        &mut buffer,
        Tag::<U16>::from_slice(tag),
    ) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            buffer.zeroize();
            Err(SealError::Integrity("authentication tag mismatch".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let (envelope, key) = seal(b"hello, sealed world!", None).unwrap();
        assert_ne!(envelope.ciphertext, b"hello, sealed world!");

        let plaintext = open(&envelope, &key).unwrap();
        assert_eq!(plaintext, b"hello, sealed world!");
    }

    #[test]
    fn test_side_channel_layout() {
        let (envelope, _key) = seal(b"data", None).unwrap();

        assert_eq!(envelope.side_channel().len(), NONCE_LEN + TAG_LEN);
        assert_eq!(envelope.nonce().unwrap().len(), NONCE_LEN);
        assert_eq!(envelope.tag().unwrap().len(), TAG_LEN);
        assert!(envelope.extra_data().is_none());
        assert_eq!(envelope.ciphertext.len(), 4);
    }

    #[test]
    fn test_given_key_is_used() {
        let key_bytes = [0x07u8; 24];
        let (envelope, key) = seal(b"data", Some(&key_bytes)).unwrap();

        assert_eq!(key.as_bytes(), &key_bytes);
        let again = SymmetricKey::from_bytes(key_bytes);
        assert_eq!(open(&envelope, &again).unwrap(), b"data");
    }

    #[test]
    fn test_wrong_length_key_is_replaced() {
        let short = [0x07u8; 16];
        let (_, key) = seal(b"data", Some(&short)).unwrap();
        assert_ne!(&key.as_bytes()[..16], &short[..]);
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let key_bytes = [0x01u8; 24];
        let (e1, _) = seal(b"same", Some(&key_bytes)).unwrap();
        let (e2, _) = seal(b"same", Some(&key_bytes)).unwrap();

        assert_ne!(e1.nonce(), e2.nonce());
        assert_ne!(e1.ciphertext, e2.ciphertext);
    }

    #[test]
    fn test_extra_data_roundtrip_and_binding() {
        let (mut envelope, key) = seal_with_extra(b"data", None, Some(b"meta")).unwrap();
        assert_eq!(envelope.extra_data(), Some(&b"meta"[..]));
        assert_eq!(open(&envelope, &key).unwrap(), b"data");

        let (_, side) = envelope.raw_parts_mut();
        let last = side.len() - 1;
        side[last] ^= 0x01;
        assert!(open(&envelope, &key).unwrap_err().is_integrity());
    }

    #[test]
    fn test_wrong_key_fails() {
        let (envelope, _) = seal(b"secret", None).unwrap();
        let other = SymmetricKey::generate();

        assert!(open(&envelope, &other).unwrap_err().is_integrity());
    }

    #[test]
    fn test_truncated_side_channel_fails() {
        let (envelope, key) = seal(b"secret", None).unwrap();
        let truncated = Envelope::from_parts(
            envelope.ciphertext.clone(),
            envelope.side_channel()[..NONCE_LEN + 4].to_vec(),
        );

        assert!(open(&truncated, &key).unwrap_err().is_integrity());
    }

    #[test]
    fn test_empty_plaintext() {
        let (envelope, key) = seal(b"", None).unwrap();
        assert!(envelope.ciphertext.is_empty());
        assert_eq!(open(&envelope, &key).unwrap(), b"");
    }

    #[test]
    fn test_envelope_cbor_roundtrip() {
        let (envelope, _) = seal_with_extra(b"test", None, Some(b"x")).unwrap();
        let bytes = envelope.to_bytes().unwrap();
        assert_eq!(Envelope::from_bytes(&bytes).unwrap(), envelope);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            plaintext in prop::collection::vec(any::<u8>(), 0..2048),
            key_bytes in any::<[u8; 24]>(),
        ) {
            let (envelope, key) = seal(&plaintext, Some(&key_bytes)).unwrap();
            prop_assert_eq!(key.as_bytes(), &key_bytes);
            prop_assert_eq!(open(&envelope, &key).unwrap(), plaintext);
        }

        #[test]
        fn prop_ciphertext_bit_flip_fails(
            plaintext in prop::collection::vec(any::<u8>(), 1..512),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let (mut envelope, key) = seal(&plaintext, None).unwrap();
            let i = index.index(envelope.ciphertext.len());
            envelope.ciphertext[i] ^= 1 << bit;

            prop_assert!(open(&envelope, &key).unwrap_err().is_integrity());
        }

        #[test]
        fn prop_tag_bit_flip_fails(
            plaintext in prop::collection::vec(any::<u8>(), 0..512),
            index in 0usize..TAG_LEN,
            bit in 0u8..8,
        ) {
            let (mut envelope, key) = seal(&plaintext, None).unwrap();
            let (_, side) = envelope.raw_parts_mut();
            side[NONCE_LEN + index] ^= 1 << bit;

            prop_assert!(open(&envelope, &key).unwrap_err().is_integrity());
        }

        #[test]
        fn prop_wrong_key_fails(
            plaintext in prop::collection::vec(any::<u8>(), 0..512),
            k1 in any::<[u8; 24]>(),
            k2 in any::<[u8; 24]>(),
        ) {
            prop_assume!(k1 != k2);
            let (envelope, _) = seal(&plaintext, Some(&k1)).unwrap();
            let wrong = SymmetricKey::from_bytes(k2);

            prop_assert!(open(&envelope, &wrong).unwrap_err().is_integrity());
        }
    }
}
