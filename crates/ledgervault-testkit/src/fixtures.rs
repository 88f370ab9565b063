//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use ledgervault_core::{
    rules, Ed25519PublicKey, Identity, InstanceId, InstanceSet, Keypair, LedgerObject, NameIndex,
    PolicyObject, Transaction,
};
use ledgervault_seal::X25519StaticSecret;

use crate::collective::MemoryCollective;
use crate::ledger::MemoryLedger;

/// Fee balance every fixture starts with.
pub const DEFAULT_FUNDS: u64 = 1_000;

/// One user on a shared in-memory ledger and collective.
pub struct TestFixture {
    pub keypair: Keypair,
    /// Secret the user receives re-encrypted keys under.
    pub reader: X25519StaticSecret,
    pub ledger: Arc<MemoryLedger>,
    pub collective: Arc<MemoryCollective>,
}

impl TestFixture {
    /// A user with a random keypair on a fresh ledger.
    pub fn new() -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        let collective = Arc::new(MemoryCollective::new(ledger.clone()));
        Self::join(ledger, collective, Keypair::generate())
    }

    /// A user with a deterministic keypair from seed on a fresh ledger.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        let collective = Arc::new(MemoryCollective::new(ledger.clone()));
        Self::join(ledger, collective, Keypair::from_seed(&seed))
    }

    /// A user with `keypair` on an existing ledger, funded with
    /// [`DEFAULT_FUNDS`].
    pub fn join(
        ledger: Arc<MemoryLedger>,
        collective: Arc<MemoryCollective>,
        keypair: Keypair,
    ) -> Self {
        ledger.credit(&keypair.public_key(), DEFAULT_FUNDS);
        Self {
            keypair,
            reader: X25519StaticSecret::generate(),
            ledger,
            collective,
        }
    }

    /// Another user on the same ledger and collective.
    pub fn peer(&self) -> Self {
        Self::join(
            self.ledger.clone(),
            self.collective.clone(),
            Keypair::generate(),
        )
    }

    /// Get the keypair's public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// The user as a policy identity.
    pub fn identity(&self) -> Identity {
        Identity::Key(self.keypair.public_key())
    }

    /// A fresh transaction signed by this user.
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.ledger.clone(), self.keypair.clone())
    }

    /// Current fee balance.
    pub fn balance(&self) -> u64 {
        self.ledger.snapshot().balance(&self.public_key())
    }

    /// Place a policy this user controls and that `readers` may read under.
    pub fn create_policy(&self, description: &str, readers: &[Identity]) -> InstanceId {
        let policy = PolicyObject::basic(description, &[self.identity()])
            .with_rule(rules::SPAWN_WRITE_RECORD, vec![self.identity()])
            .with_rule(rules::SPAWN_READ_REQUEST, readers.to_vec());
        self.ledger.genesis(LedgerObject::Policy(policy))
    }

    /// Place an empty name index.
    pub fn create_index(&self) -> InstanceId {
        self.ledger.genesis(LedgerObject::NameIndex(NameIndex::new()))
    }

    /// Place an empty instance set.
    pub fn create_set(&self) -> InstanceId {
        self.ledger
            .genesis(LedgerObject::InstanceSet(InstanceSet::new()))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create fixtures sharing one ledger and collective for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    let ledger = Arc::new(MemoryLedger::new());
    let collective = Arc::new(MemoryCollective::new(ledger.clone()));
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::join(
                ledger.clone(),
                collective.clone(),
                Keypair::from_seed(&seed),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_is_funded() {
        let fixture = TestFixture::new();
        assert_eq!(fixture.balance(), DEFAULT_FUNDS);
    }

    #[test]
    fn test_policy_grants_readers() {
        let fixture = TestFixture::new();
        let reader = fixture.peer();
        let policy = fixture.create_policy("Finance", &[reader.identity()]);

        let state = fixture.ledger.snapshot();
        assert!(state
            .is_authorized(&reader.identity(), &policy, rules::SPAWN_READ_REQUEST)
            .unwrap());
        assert!(!state
            .is_authorized(&fixture.identity(), &policy, rules::SPAWN_READ_REQUEST)
            .unwrap());
        assert!(state
            .is_authorized(&fixture.identity(), &policy, rules::EVOLVE)
            .unwrap());
    }

    #[test]
    fn test_multi_party() {
        let parties = multi_party_fixtures(3);

        // Each party has unique keys
        let pks: Vec<_> = parties.iter().map(|p| p.public_key()).collect();
        assert_ne!(pks[0], pks[1]);
        assert_ne!(pks[1], pks[2]);
        assert_ne!(pks[0], pks[2]);

        // and shares the ledger
        assert!(Arc::ptr_eq(&parties[0].ledger, &parties[2].ledger));
    }
}
