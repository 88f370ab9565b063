//! The secret store: encrypted files whose keys only the collective can
//! release.
//!
//! Storing a file seals it under a fresh symmetric key, wraps that key toward
//! the collective and queues a write record plus a name index entry into the
//! caller's transaction. Reading a file goes through a paid read request and
//! a re-encryption by the collective, which enforces the record's policy.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use ledgervault_core::{
    rules, Action, AuthorizationOracle, CollectiveWriteRecord, Identity, InstanceId, Keypair,
    Ledger, LedgerObject, Method, NameIndex, ObjectKind, Operation, Projection,
    ReadRequestRecord, Reencryptor, Transaction,
};
use ledgervault_seal::{open, seal, X25519StaticSecret};

use crate::error::{Result, VaultError};

/// Configuration for the secret store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SecretStoreConfig {
    /// Fee paid with every read request.
    pub read_request_fee: u64,
    /// Upper bound on waiting for the collective, in seconds when loaded.
    #[serde(deserialize_with = "duration_secs")]
    pub reencrypt_timeout: Duration,
}

impl Default for SecretStoreConfig {
    fn default() -> Self {
        Self {
            read_request_fee: 10,
            reencrypt_timeout: Duration::from_secs(60),
        }
    }
}

fn duration_secs<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
    let secs = f64::deserialize(d)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

/// Progress points reported while retrieving a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    /// The read request is committed.
    DecryptionRequested,
    /// Waiting on the collective.
    CollectiveReencryption,
}

impl Milestone {
    /// Completion percentage at this point.
    pub fn percent(&self) -> u8 {
        match self {
            Milestone::DecryptionRequested => 50,
            Milestone::CollectiveReencryption => 75,
        }
    }

    /// Whether the work after this point has no measurable progress.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Milestone::CollectiveReencryption)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Milestone::DecryptionRequested => "Decryption Request",
            Milestone::CollectiveReencryption => "Collective Re-Encryption",
        }
    }
}

/// Callback receiving retrieval milestones.
pub type Progress<'a> = &'a (dyn Fn(Milestone) + Send + Sync);

/// The external capabilities a store talks to.
#[derive(Clone)]
pub struct Capabilities {
    pub ledger: Arc<dyn Ledger>,
    pub collective: Arc<dyn Reencryptor>,
    pub oracle: Arc<dyn AuthorizationOracle>,
}

/// Encrypted file storage governed by ledger policies.
pub struct SecretStore {
    capabilities: Capabilities,
    /// Signs read requests and is the principal for access checks.
    signer: Keypair,
    /// The name index object on the ledger.
    index_id: InstanceId,
    index: Projection<NameIndex>,
    config: SecretStoreConfig,
}

impl SecretStore {
    /// Create a store over the name index `index_id`, mirrored from
    /// `index_feed`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(
        capabilities: Capabilities,
        signer: Keypair,
        index_id: InstanceId,
        index_feed: watch::Receiver<NameIndex>,
        config: SecretStoreConfig,
    ) -> Self {
        Self {
            capabilities,
            signer,
            index_id,
            index: Projection::follow(index_feed),
            config,
        }
    }

    pub fn config(&self) -> &SecretStoreConfig {
        &self.config
    }

    /// Id of the ledger name index.
    pub fn index_id(&self) -> InstanceId {
        self.index_id
    }

    /// A fresh transaction signed by this store's principal.
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.capabilities.ledger.clone(), self.signer.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Index
    // ─────────────────────────────────────────────────────────────────────────

    /// The current projected name index.
    pub fn files(&self) -> NameIndex {
        self.index.get()
    }

    /// Write record id for `name`, if indexed.
    pub fn lookup(&self, name: &str) -> Option<InstanceId> {
        self.index.with(|index| index.get(name))
    }

    /// Subscribe to index snapshots.
    pub fn subscribe_index(&self) -> watch::Receiver<NameIndex> {
        self.index.subscribe()
    }

    /// Last queued change to `name` in `tx`: `Some(true)` for an insert,
    /// `Some(false)` for a removal.
    fn queued_entry(&self, tx: &Transaction, name: &str) -> Option<bool> {
        tx.operations().iter().fold(None, |state, op| match op {
            Operation::Invoke { id, method } if *id == self.index_id => match method {
                Method::IndexInsert { name: n, .. } if n == name => Some(true),
                Method::IndexRemove { name: n } if n == name => Some(false),
                _ => state,
            },
            _ => state,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Store / Remove
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt `data` and queue it into `tx` under `name`, readable by those
    /// `policy` allows.
    ///
    /// Returns the id the write record will have once `tx` commits. The name
    /// check is local; the ledger has the last word at commit.
    pub fn store_file(
        &self,
        tx: &mut Transaction,
        policy: InstanceId,
        name: &str,
        data: &[u8],
    ) -> Result<InstanceId> {
        let taken = match self.queued_entry(tx, name) {
            Some(queued) => queued,
            None => self.index.with(|index| index.contains(name)),
        };
        if taken {
            return Err(VaultError::DuplicateName(name.to_string()));
        }

        let collective = self.capabilities.collective.collective_key();
        let (envelope, key) = seal(data, None)?;
        let encrypted_key = collective.encrypt_key(&key, policy.as_bytes())?;
        drop(key);

        let record = CollectiveWriteRecord {
            lts_id: collective.id,
            policy,
            encrypted_key,
            envelope,
        };
        let id = tx.spawn(LedgerObject::WriteRecord(record));
        tx.invoke(
            self.index_id,
            Method::IndexInsert {
                name: name.to_string(),
                id,
            },
        );

        info!(%id, %policy, name, size = data.len(), "file queued");
        Ok(id)
    }

    /// Queue deletion of the file indexed under `name`.
    ///
    /// The file stays visible until the index feed reflects the commit.
    pub fn remove_file(&self, tx: &mut Transaction, name: &str) -> Result<InstanceId> {
        let id = match self.queued_entry(tx, name) {
            Some(false) => None,
            _ => self.lookup(name),
        }
        .ok_or_else(|| VaultError::NotFound(format!("no file named {name}")))?;

        tx.delete(id, ObjectKind::WriteRecord);
        tx.invoke(
            self.index_id,
            Method::IndexRemove {
                name: name.to_string(),
            },
        );

        info!(%id, name, "file removal queued");
        Ok(id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Retrieve
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch and decrypt the file stored at `id`.
    ///
    /// Commits a paid read request for `requester`'s public key, asks the
    /// collective to re-encrypt the file key toward it, then decrypts. A
    /// refusal from the collective is returned as is. The read request stays
    /// on the ledger whatever happens after its commit.
    pub async fn retrieve_file(
        &self,
        id: InstanceId,
        requester: &X25519StaticSecret,
        progress: Option<Progress<'_>>,
    ) -> Result<Vec<u8>> {
        let report = |milestone: Milestone| {
            debug!(
                %id,
                percent = milestone.percent(),
                milestone = milestone.label(),
                "retrieval progress"
            );
            if let Some(progress) = progress {
                progress(milestone);
            }
        };

        let mut tx = self.begin();
        let read_id = tx.spawn(LedgerObject::ReadRequest(ReadRequestRecord {
            write_id: id,
            requester: requester.public_key(),
            principal: Identity::Key(self.signer.public_key()),
        }));
        tx.pay_fee(self.config.read_request_fee);
        tx.commit().await.map_err(VaultError::Transaction)?;
        report(Milestone::DecryptionRequested);

        let ledger = &self.capabilities.ledger;
        let write_proof = ledger.proof(&id).await.map_err(VaultError::Proof)?;
        let record = write_proof.write_record().map_err(VaultError::Proof)?;
        let read_proof = ledger.proof(&read_id).await.map_err(VaultError::Proof)?;
        read_proof.verify().map_err(VaultError::Proof)?;
        report(Milestone::CollectiveReencryption);

        let limit = self.config.reencrypt_timeout;
        let handle = tokio::time::timeout(
            limit,
            self.capabilities.collective.reencrypt(&write_proof, &read_proof),
        )
        .await
        .map_err(|_| {
            warn!(%id, ?limit, "collective did not answer");
            VaultError::Timeout(limit)
        })?
        .map_err(|e| {
            warn!(%id, error = %e, "re-encryption failed");
            VaultError::from(e)
        })?;

        let key = handle.unwrap(requester)?;
        let plaintext = open(&record.envelope, &key)?;

        info!(%id, size = plaintext.len(), "file retrieved");
        Ok(plaintext)
    }

    /// Whether this store's principal may currently read the file at `id`.
    ///
    /// Advisory only: the policy may change before a read is attempted, and
    /// the collective decides at that point.
    pub async fn check_access(&self, id: InstanceId) -> Result<bool> {
        let record = self
            .capabilities
            .ledger
            .proof(&id)
            .await
            .and_then(|proof| proof.write_record())
            .map_err(VaultError::Proof)?;

        let principal = Identity::Key(self.signer.public_key());
        let action = Action::new(record.policy, rules::SPAWN_READ_REQUEST);
        self.capabilities
            .oracle
            .is_authorized(&principal, &action)
            .await
            .map_err(VaultError::Ledger)
    }
}
