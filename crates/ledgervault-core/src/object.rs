//! Ledger object model.
//!
//! Everything the vault records on the ledger is one of these objects. They
//! are immutable values: a commit replaces an object's content with a new
//! version, it never edits in place.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use ledgervault_seal::{Envelope, WrappedKey, X25519PublicKey};

use crate::crypto::Ed25519PublicKey;
use crate::error::CoreError;
use crate::types::InstanceId;

/// Rule names understood by policy objects.
pub mod rules {
    /// Spawn a read request against a write record governed by the policy.
    pub const SPAWN_READ_REQUEST: &str = "spawn:readRequest";
    /// Spawn a write record under the policy.
    pub const SPAWN_WRITE_RECORD: &str = "spawn:writeRecord";
    /// Change the policy's description or rules.
    pub const EVOLVE: &str = "invoke:policy.evolve";
    /// Sign on behalf of the policy.
    pub const SIGN: &str = "_sign";
    /// Move value out of an account governed by the policy.
    pub const TRANSFER: &str = "invoke:account.transfer";
}

/// Discriminator for ledger objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    WriteRecord,
    ReadRequest,
    Credential,
    Policy,
    Account,
    InstanceSet,
    NameIndex,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::WriteRecord => "writeRecord",
            ObjectKind::ReadRequest => "readRequest",
            ObjectKind::Credential => "credential",
            ObjectKind::Policy => "policy",
            ObjectKind::Account => "account",
            ObjectKind::InstanceSet => "instanceSet",
            ObjectKind::NameIndex => "nameIndex",
        };
        f.write_str(name)
    }
}

/// Someone a policy rule can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identity {
    /// A signing key.
    Key(Ed25519PublicKey),
    /// Anyone who satisfies the `_sign` rule of another policy.
    Policy(InstanceId),
}

/// One rule of a policy: who may perform `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub action: String,
    pub identities: Vec<Identity>,
}

/// An access-control policy object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyObject {
    /// Human-readable description; doubles as the name of groups and actions.
    pub description: String,
    pub rules: Vec<Rule>,
}

impl PolicyObject {
    /// A policy with no rules.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            rules: Vec::new(),
        }
    }

    /// A policy whose signers may sign for it and evolve it.
    pub fn basic(description: impl Into<String>, signers: &[Identity]) -> Self {
        Self::new(description)
            .with_rule(rules::SIGN, signers.to_vec())
            .with_rule(rules::EVOLVE, signers.to_vec())
    }

    /// Add or replace a rule.
    pub fn with_rule(mut self, action: &str, identities: Vec<Identity>) -> Self {
        self.rules.retain(|r| r.action != action);
        self.rules.push(Rule {
            action: action.to_string(),
            identities,
        });
        self
    }

    /// Identities allowed to perform `action`, if the rule exists.
    pub fn identities_for(&self, action: &str) -> Option<&[Identity]> {
        self.rules
            .iter()
            .find(|r| r.action == action)
            .map(|r| r.identities.as_slice())
    }
}

/// Public attribute holding a contact's display name.
pub const ALIAS_ATTRIBUTE: &str = "alias";

/// A user credential: an owner key plus public attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub owner: Ed25519PublicKey,
    pub public: BTreeMap<String, Vec<u8>>,
}

impl Credential {
    /// A credential carrying only an alias.
    pub fn with_alias(owner: Ed25519PublicKey, alias: &str) -> Self {
        let mut public = BTreeMap::new();
        public.insert(ALIAS_ATTRIBUTE.to_string(), alias.as_bytes().to_vec());
        Self { owner, public }
    }

    /// The alias attribute, if present and valid UTF-8.
    pub fn alias(&self) -> Option<&str> {
        self.public
            .get(ALIAS_ATTRIBUTE)
            .and_then(|v| std::str::from_utf8(v).ok())
    }
}

/// A value-transfer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: u64,
    /// The policy whose `TRANSFER` rule governs this account.
    pub policy: InstanceId,
}

/// An ordered set of ids, kept in order of arrival.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSet {
    members: Vec<InstanceId>,
}

impl InstanceSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` unless already present.
    pub fn insert(&mut self, id: InstanceId) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        self.members.push(id);
        true
    }

    /// Remove `id` if present.
    pub fn remove(&mut self, id: &InstanceId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != id);
        self.members.len() != before
    }

    pub fn contains(&self, id: &InstanceId) -> bool {
        self.members.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstanceId> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FromIterator<InstanceId> for InstanceSet {
    fn from_iter<I: IntoIterator<Item = InstanceId>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Name to write record index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIndex {
    entries: BTreeMap<String, InstanceId>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<InstanceId> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, name: String, id: InstanceId) -> Option<InstanceId> {
        self.entries.insert(name, id)
    }

    pub fn remove(&mut self, name: &str) -> Option<InstanceId> {
        self.entries.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, InstanceId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An encrypted file recorded on the ledger.
///
/// The file key inside `encrypted_key` is wrapped toward the collective and
/// bound to `policy`. Never edited; replaced by delete-and-recreate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveWriteRecord {
    /// The collective key this record was encrypted for.
    pub lts_id: [u8; 32],
    /// The policy that decides who may read.
    pub policy: InstanceId,
    pub encrypted_key: WrappedKey,
    pub envelope: Envelope,
}

/// A request to have a write record's key re-encrypted for `requester`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequestRecord {
    pub write_id: InstanceId,
    pub requester: X25519PublicKey,
    /// The signer that spawned this request.
    pub principal: Identity,
}

/// Any object the vault stores on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerObject {
    WriteRecord(CollectiveWriteRecord),
    ReadRequest(ReadRequestRecord),
    Credential(Credential),
    Policy(PolicyObject),
    Account(Account),
    InstanceSet(InstanceSet),
    NameIndex(NameIndex),
}

impl LedgerObject {
    /// The kind of this object.
    pub fn kind(&self) -> ObjectKind {
        match self {
            LedgerObject::WriteRecord(_) => ObjectKind::WriteRecord,
            LedgerObject::ReadRequest(_) => ObjectKind::ReadRequest,
            LedgerObject::Credential(_) => ObjectKind::Credential,
            LedgerObject::Policy(_) => ObjectKind::Policy,
            LedgerObject::Account(_) => ObjectKind::Account,
            LedgerObject::InstanceSet(_) => ObjectKind::InstanceSet,
            LedgerObject::NameIndex(_) => ObjectKind::NameIndex,
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CoreError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::Decoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_instance_set_semantics() {
        let a = InstanceId::from_bytes([1; 32]);
        let b = InstanceId::from_bytes([2; 32]);
        let mut set = InstanceSet::new();

        assert!(set.insert(a));
        assert!(!set.insert(a));
        assert!(set.insert(b));
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![a, b]);

        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_policy_basic_rules() {
        let signer = Identity::Key(Ed25519PublicKey::from_bytes([7; 32]));
        let policy = PolicyObject::basic("Finance", &[signer]);

        assert_eq!(policy.identities_for(rules::SIGN), Some(&[signer][..]));
        assert_eq!(policy.identities_for(rules::EVOLVE), Some(&[signer][..]));
        assert_eq!(policy.identities_for(rules::TRANSFER), None);
    }

    #[test]
    fn test_with_rule_replaces() {
        let a = Identity::Key(Ed25519PublicKey::from_bytes([1; 32]));
        let b = Identity::Key(Ed25519PublicKey::from_bytes([2; 32]));
        let policy = PolicyObject::new("p")
            .with_rule(rules::SIGN, vec![a])
            .with_rule(rules::SIGN, vec![b]);

        assert_eq!(policy.rules.len(), 1);
        assert_eq!(policy.identities_for(rules::SIGN), Some(&[b][..]));
    }

    #[test]
    fn test_credential_alias() {
        let cred = Credential::with_alias(Ed25519PublicKey::from_bytes([3; 32]), "alice");
        assert_eq!(cred.alias(), Some("alice"));
    }

    #[test]
    fn test_object_cbor_roundtrip() {
        let object = LedgerObject::Policy(PolicyObject::new("Accounting"));
        let bytes = object.to_bytes().unwrap();
        let back = LedgerObject::from_bytes(&bytes).unwrap();

        assert_eq!(back, object);
        assert_eq!(back.kind(), ObjectKind::Policy);
    }

    proptest! {
        #[test]
        fn instance_set_insert_is_idempotent(ids in prop::collection::vec(any::<[u8; 32]>(), 0..16)) {
            let once: InstanceSet = ids.iter().copied().map(InstanceId::from_bytes).collect();
            let mut twice = once.clone();
            for id in &ids {
                twice.insert(InstanceId::from_bytes(*id));
            }

            prop_assert_eq!(once, twice);
        }
    }
}
