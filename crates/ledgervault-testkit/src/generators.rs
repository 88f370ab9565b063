//! Proptest generators for property-based testing.

use proptest::prelude::*;

use ledgervault_core::{Ed25519PublicKey, Identity, InstanceId, Keypair};
use ledgervault_seal::SYMMETRIC_KEY_LEN;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random Ed25519PublicKey.
pub fn public_key() -> impl Strategy<Value = Ed25519PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a random InstanceId.
pub fn instance_id() -> impl Strategy<Value = InstanceId> {
    any::<[u8; 32]>().prop_map(InstanceId::from_bytes)
}

/// Generate a key or policy identity.
pub fn identity() -> impl Strategy<Value = Identity> {
    prop_oneof![
        public_key().prop_map(Identity::Key),
        instance_id().prop_map(Identity::Policy),
    ]
}

/// Generate a valid symmetric key.
pub fn key_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), SYMMETRIC_KEY_LEN)
}

/// Generate key material of the wrong length.
pub fn bad_key_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64).prop_filter("not a valid key length", |k| {
        k.len() != SYMMETRIC_KEY_LEN
    })
}

/// Generate file contents of specified max length.
pub fn file_data(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a file name.
pub fn file_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,23}\\.(pdf|txt|csv)".prop_map(String::from)
}

/// Generate a group or action name.
pub fn display_name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,15}( [A-Z][a-z]{2,15})?".prop_map(String::from)
}

/// A file to store.
#[derive(Debug, Clone)]
pub struct FileParams {
    pub name: String,
    pub data: Vec<u8>,
}

impl Arbitrary for FileParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (file_name(), file_data(4096))
            .prop_map(|(name, data)| FileParams { name, data })
            .boxed()
    }
}
