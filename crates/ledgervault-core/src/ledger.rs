//! External capabilities the vault is built on.
//!
//! These traits are consumed, never implemented, by the vault itself. The
//! testkit provides in-memory implementations.
//!
//! The vault is a thin coordinator: the security boundary lives in the
//! collective behind [`Reencryptor`]. A read request that the collective
//! refuses is an error, never a silent success.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ledgervault_seal::{CollectiveKey, EncryptedKeyHandle};

use crate::crypto::Blake3Hash;
use crate::error::{LedgerError, ReencryptError, Result};
use crate::object::{CollectiveWriteRecord, LedgerObject, ObjectKind, ReadRequestRecord, Identity};
use crate::transaction::{CommitReceipt, SignedTransaction};
use crate::types::InstanceId;

/// Proof that an object exists on the ledger with the given content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub id: InstanceId,
    pub kind: ObjectKind,
    pub version: u64,
    /// CBOR encoding of the object.
    pub value: Vec<u8>,
    pub digest: Blake3Hash,
}

impl Proof {
    /// Build a proof for `object` at `version`.
    pub fn new(id: InstanceId, version: u64, object: &LedgerObject) -> Result<Self> {
        let value = object.to_bytes()?;
        let digest = Self::compute_digest(&id, version, &value);
        Ok(Self {
            id,
            kind: object.kind(),
            version,
            value,
            digest,
        })
    }

    fn compute_digest(id: &InstanceId, version: u64, value: &[u8]) -> Blake3Hash {
        let mut hasher = blake3::Hasher::new_derive_key("ledgervault-proof-v0");
        hasher.update(id.as_bytes());
        hasher.update(&version.to_le_bytes());
        hasher.update(value);
        Blake3Hash(*hasher.finalize().as_bytes())
    }

    /// Check the digest against the content.
    pub fn verify(&self) -> Result<()> {
        if Self::compute_digest(&self.id, self.version, &self.value) != self.digest {
            return Err(LedgerError::InvalidProof(self.id));
        }
        Ok(())
    }

    /// Verify and decode the proven object.
    pub fn object(&self) -> Result<LedgerObject> {
        self.verify()?;
        let object = LedgerObject::from_bytes(&self.value)?;
        if object.kind() != self.kind {
            return Err(LedgerError::InvalidProof(self.id));
        }
        Ok(object)
    }

    /// Verify and decode a write record.
    pub fn write_record(&self) -> Result<CollectiveWriteRecord> {
        match self.object()? {
            LedgerObject::WriteRecord(record) => Ok(record),
            other => Err(LedgerError::UnexpectedKind {
                id: self.id,
                expected: ObjectKind::WriteRecord,
                found: other.kind(),
            }),
        }
    }

    /// Verify and decode a read request.
    pub fn read_request(&self) -> Result<ReadRequestRecord> {
        match self.object()? {
            LedgerObject::ReadRequest(record) => Ok(record),
            other => Err(LedgerError::UnexpectedKind {
                id: self.id,
                expected: ObjectKind::ReadRequest,
                found: other.kind(),
            }),
        }
    }
}

/// The ledger: atomic commits and proofs of existence.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Apply a signed transaction atomically, or reject it as a whole.
    async fn commit(&self, tx: SignedTransaction) -> Result<CommitReceipt>;

    /// Proof for the current version of an object.
    async fn proof(&self, id: &InstanceId) -> Result<Proof>;
}

/// Something a principal may be allowed to do: a rule on a policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action {
    pub policy: InstanceId,
    pub rule: String,
}

impl Action {
    pub fn new(policy: InstanceId, rule: &str) -> Self {
        Self {
            policy,
            rule: rule.to_string(),
        }
    }
}

/// Answers "may this principal perform this action".
///
/// Answers are a snapshot; the policy may change before the action is
/// attempted.
#[async_trait]
pub trait AuthorizationOracle: Send + Sync {
    async fn is_authorized(&self, principal: &Identity, action: &Action) -> Result<bool>;
}

/// The collective holding the long-term secret.
#[async_trait]
pub trait Reencryptor: Send + Sync {
    /// Public description of the collective key.
    fn collective_key(&self) -> CollectiveKey;

    /// Re-encrypt the key of `write` toward the requester named in `read`.
    ///
    /// The collective checks authorization itself and refuses unauthorized
    /// requests.
    async fn reencrypt(
        &self,
        write: &Proof,
        read: &Proof,
    ) -> std::result::Result<EncryptedKeyHandle, ReencryptError>;
}
