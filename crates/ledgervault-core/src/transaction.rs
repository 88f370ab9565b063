//! Pending transactions.
//!
//! A [`Transaction`] is a local queue of operations. Nothing reaches the
//! ledger until [`Transaction::commit`], which signs the queue and hands it
//! to the [`Ledger`] as one atomic unit. Dropping a transaction discards it.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::{CoreError, Result};
use crate::ledger::Ledger;
use crate::object::{LedgerObject, ObjectKind};
use crate::types::InstanceId;

/// Domain separator for transaction signatures.
pub const TX_SIGN_DOMAIN: &[u8] = b"ledgervault-tx-v0:";

/// A method invoked on an existing object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// Union `{id}` into an instance set.
    InstanceSetAdd(InstanceId),
    /// Remove `{id}` from an instance set.
    InstanceSetRemove(InstanceId),
    /// Map `name` to `id` in a name index.
    IndexInsert { name: String, id: InstanceId },
    /// Drop `name` from a name index.
    IndexRemove { name: String },
    /// Set a public attribute on a credential.
    SetPublicAttribute { key: String, value: Vec<u8> },
    /// Evolve a policy to a new description.
    Evolve { description: String },
    /// Move value between accounts.
    Transfer { to: InstanceId, amount: u64 },
}

/// One queued ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Spawn { id: InstanceId, object: LedgerObject },
    Invoke { id: InstanceId, method: Method },
    Delete { id: InstanceId, kind: ObjectKind },
    /// Pay a fee from the signer's fee account.
    PayFee { amount: u64 },
}

/// A transaction as handed to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub operations: Vec<Operation>,
    pub signer: Ed25519PublicKey,
    pub signature: Ed25519Signature,
}

impl SignedTransaction {
    /// The bytes a signer signs for `operations`.
    pub fn signing_bytes(operations: &[Operation]) -> std::result::Result<Vec<u8>, CoreError> {
        let mut buf = TX_SIGN_DOMAIN.to_vec();
        ciborium::into_writer(&operations, &mut buf)
            .map_err(|e| CoreError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Sign `operations` with `signer`.
    pub fn sign(
        operations: Vec<Operation>,
        signer: &Keypair,
    ) -> std::result::Result<Self, CoreError> {
        let signature = signer.sign(&Self::signing_bytes(&operations)?);
        Ok(Self {
            operations,
            signer: signer.public_key(),
            signature,
        })
    }

    /// Check the signature.
    pub fn verify(&self) -> std::result::Result<(), CoreError> {
        self.signer
            .verify(&Self::signing_bytes(&self.operations)?, &self.signature)
    }

    /// Hash identifying this transaction.
    pub fn hash(&self) -> std::result::Result<Blake3Hash, CoreError> {
        let mut bytes = Self::signing_bytes(&self.operations)?;
        bytes.extend_from_slice(self.signature.0.as_slice());
        Ok(Blake3Hash::hash(&bytes))
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub tx_hash: Blake3Hash,
    /// Position of the commit in the ledger.
    pub index: u64,
    /// Objects created by the transaction, in spawn order.
    pub spawned: Vec<InstanceId>,
}

/// A pending transaction.
pub struct Transaction {
    ledger: Arc<dyn Ledger>,
    signer: Keypair,
    seed: [u8; 32],
    spawned: u32,
    operations: Vec<Operation>,
}

impl Transaction {
    /// Start an empty transaction signed by `signer`.
    pub fn new(ledger: Arc<dyn Ledger>, signer: Keypair) -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self {
            ledger,
            signer,
            seed,
            spawned: 0,
            operations: Vec::new(),
        }
    }

    /// Public key of the signer.
    pub fn signer(&self) -> Ed25519PublicKey {
        self.signer.public_key()
    }

    /// Queue a spawn and return the id the object will have once committed.
    pub fn spawn(&mut self, object: LedgerObject) -> InstanceId {
        let id = InstanceId::derive(&self.seed, self.spawned);
        self.spawned += 1;
        self.spawn_at(id, object);
        id
    }

    /// Queue a spawn at a caller-chosen id.
    pub fn spawn_at(&mut self, id: InstanceId, object: LedgerObject) {
        debug!(%id, kind = %object.kind(), "queue spawn");
        self.operations.push(Operation::Spawn { id, object });
    }

    /// Queue a method call on an existing object.
    pub fn invoke(&mut self, id: InstanceId, method: Method) {
        debug!(%id, ?method, "queue invoke");
        self.operations.push(Operation::Invoke { id, method });
    }

    /// Queue deletion of an object.
    pub fn delete(&mut self, id: InstanceId, kind: ObjectKind) {
        debug!(%id, %kind, "queue delete");
        self.operations.push(Operation::Delete { id, kind });
    }

    /// Queue a fee payment; it succeeds or fails with the rest of the
    /// transaction.
    pub fn pay_fee(&mut self, amount: u64) {
        self.operations.push(Operation::PayFee { amount });
    }

    /// Operations queued so far, in issue order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Sign and submit all queued operations atomically.
    pub async fn commit(self) -> Result<CommitReceipt> {
        let count = self.operations.len();
        let signed = SignedTransaction::sign(self.operations, &self.signer)?;

        match self.ledger.commit(signed).await {
            Ok(receipt) => {
                debug!(index = receipt.index, ops = count, "transaction committed");
                Ok(receipt)
            }
            Err(e) => {
                warn!(error = %e, ops = count, "transaction rejected");
                Err(e)
            }
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("signer", &self.signer.public_key())
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Proof;
    use crate::object::PolicyObject;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the last transaction it was handed.
    #[derive(Default)]
    struct RecordingLedger {
        last: Mutex<Option<SignedTransaction>>,
    }

    #[async_trait]
    impl Ledger for RecordingLedger {
        async fn commit(&self, tx: SignedTransaction) -> Result<CommitReceipt> {
            tx.verify()?;
            let spawned = tx
                .operations
                .iter()
                .filter_map(|op| match op {
                    Operation::Spawn { id, .. } => Some(*id),
                    _ => None,
                })
                .collect();
            let tx_hash = tx.hash()?;
            *self.last.lock().unwrap() = Some(tx);
            Ok(CommitReceipt {
                tx_hash,
                index: 1,
                spawned,
            })
        }

        async fn proof(&self, id: &InstanceId) -> Result<Proof> {
            Err(crate::error::LedgerError::UnknownObject(*id))
        }
    }

    #[test]
    fn test_spawn_ids_are_distinct_and_ordered() {
        let ledger = Arc::new(RecordingLedger::default());
        let mut tx = Transaction::new(ledger, Keypair::generate());

        let a = tx.spawn(LedgerObject::Policy(PolicyObject::new("a")));
        let b = tx.spawn(LedgerObject::Policy(PolicyObject::new("b")));

        assert_ne!(a, b);
        assert_eq!(tx.len(), 2);
        assert!(matches!(tx.operations()[0], Operation::Spawn { id, .. } if id == a));
        assert!(matches!(tx.operations()[1], Operation::Spawn { id, .. } if id == b));
    }

    #[tokio::test]
    async fn test_commit_signs_operations() {
        let ledger = Arc::new(RecordingLedger::default());
        let keypair = Keypair::generate();
        let mut tx = Transaction::new(ledger.clone(), keypair.clone());

        let id = tx.spawn(LedgerObject::Policy(PolicyObject::new("a")));
        tx.pay_fee(10);
        let receipt = tx.commit().await.unwrap();

        assert_eq!(receipt.spawned, vec![id]);
        let last = ledger.last.lock().unwrap().clone().unwrap();
        assert_eq!(last.signer, keypair.public_key());
        assert_eq!(last.operations.len(), 2);
    }

    #[test]
    fn test_tampered_transaction_fails_verification() {
        let keypair = Keypair::generate();
        let mut signed =
            SignedTransaction::sign(vec![Operation::PayFee { amount: 1 }], &keypair).unwrap();
        signed.operations = vec![Operation::PayFee { amount: 1000 }];

        assert!(signed.verify().is_err());
    }
}
