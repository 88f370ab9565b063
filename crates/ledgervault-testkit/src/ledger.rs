//! In-memory ledger.
//!
//! Applies signed transactions atomically against a map of versioned
//! objects and publishes every committed state over a `watch` channel, so
//! tests can derive upstream feeds from it. Also answers authorization
//! questions from the stored policies.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::watch;
use tracing::{debug, warn};

use ledgervault_core::{
    rules, Action, AuthorizationOracle, CommitReceipt, Ed25519PublicKey, Identity, InstanceId,
    InstanceSet, Ledger, LedgerError, LedgerObject, Method, NameIndex, ObjectKind, Operation,
    PolicyObject, Proof, Result, SignedTransaction,
};

/// Policies may name other policies; chains deeper than this never match.
const MAX_POLICY_DEPTH: usize = 8;

/// An object and how many times it has been changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub version: u64,
    pub object: LedgerObject,
}

/// A committed ledger state.
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    objects: BTreeMap<InstanceId, Versioned>,
    balances: BTreeMap<Ed25519PublicKey, u64>,
    height: u64,
}

impl LedgerState {
    /// The object at `id`.
    pub fn get(&self, id: &InstanceId) -> Option<&LedgerObject> {
        self.objects.get(id).map(|v| &v.object)
    }

    pub fn version(&self, id: &InstanceId) -> Option<u64> {
        self.objects.get(id).map(|v| v.version)
    }

    pub fn contains(&self, id: &InstanceId) -> bool {
        self.objects.contains_key(id)
    }

    /// Number of commits applied.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Fee balance of a signer.
    pub fn balance(&self, key: &Ed25519PublicKey) -> u64 {
        self.balances.get(key).copied().unwrap_or(0)
    }

    /// The name index at `id`, empty if there is none.
    pub fn name_index(&self, id: &InstanceId) -> NameIndex {
        match self.get(id) {
            Some(LedgerObject::NameIndex(index)) => index.clone(),
            _ => NameIndex::new(),
        }
    }

    /// The instance set at `id`, empty if there is none.
    pub fn instance_set(&self, id: &InstanceId) -> InstanceSet {
        match self.get(id) {
            Some(LedgerObject::InstanceSet(set)) => set.clone(),
            _ => InstanceSet::new(),
        }
    }

    /// Members of the set at `id` that still exist, in arrival order.
    pub fn members(&self, set_id: &InstanceId) -> Vec<(InstanceId, LedgerObject)> {
        self.instance_set(set_id)
            .iter()
            .filter_map(|id| self.get(id).map(|object| (*id, object.clone())))
            .collect()
    }

    fn expect_kind(&self, id: &InstanceId, expected: ObjectKind) -> Result<&LedgerObject> {
        let object = self.get(id).ok_or(LedgerError::UnknownObject(*id))?;
        if object.kind() != expected {
            return Err(LedgerError::UnexpectedKind {
                id: *id,
                expected,
                found: object.kind(),
            });
        }
        Ok(object)
    }

    fn policy(&self, id: &InstanceId) -> Result<&PolicyObject> {
        match self.expect_kind(id, ObjectKind::Policy)? {
            LedgerObject::Policy(policy) => Ok(policy),
            _ => Err(LedgerError::UnknownObject(*id)),
        }
    }

    /// Whether `principal` satisfies `rule` on the policy at `policy`.
    ///
    /// A policy identity is satisfied by anyone who satisfies that policy's
    /// `_sign` rule. Fails if `policy` is not a policy.
    pub fn is_authorized(
        &self,
        principal: &Identity,
        policy: &InstanceId,
        rule: &str,
    ) -> Result<bool> {
        let policy = self.policy(policy)?;
        Ok(self.satisfies(principal, policy, rule, 0))
    }

    fn satisfies(
        &self,
        principal: &Identity,
        policy: &PolicyObject,
        rule: &str,
        depth: usize,
    ) -> bool {
        if depth >= MAX_POLICY_DEPTH {
            return false;
        }
        let Some(identities) = policy.identities_for(rule) else {
            return false;
        };
        identities.iter().any(|identity| {
            if identity == principal {
                return true;
            }
            match identity {
                Identity::Policy(inner) => match self.policy(inner) {
                    Ok(inner) => self.satisfies(principal, inner, rules::SIGN, depth + 1),
                    Err(_) => false,
                },
                Identity::Key(_) => false,
            }
        })
    }

    fn apply(&mut self, signer: &Ed25519PublicKey, op: &Operation) -> Result<()> {
        match op {
            Operation::Spawn { id, object } => {
                if self.contains(id) {
                    return Err(LedgerError::AlreadyExists(*id));
                }
                self.check_spawn(signer, object)?;
                self.objects.insert(
                    *id,
                    Versioned {
                        version: 0,
                        object: object.clone(),
                    },
                );
            }
            Operation::Invoke { id, method } => self.invoke(signer, id, method)?,
            Operation::Delete { id, kind } => {
                self.expect_kind(id, *kind)?;
                self.objects.remove(id);
            }
            Operation::PayFee { amount } => {
                let available = self.balance(signer);
                if available < *amount {
                    return Err(LedgerError::InsufficientFunds {
                        needed: *amount,
                        available,
                    });
                }
                self.balances.insert(*signer, available - amount);
            }
        }
        Ok(())
    }

    fn check_spawn(&self, signer: &Ed25519PublicKey, object: &LedgerObject) -> Result<()> {
        match object {
            LedgerObject::WriteRecord(record) => {
                self.policy(&record.policy)?;
            }
            LedgerObject::ReadRequest(request) => {
                self.expect_kind(&request.write_id, ObjectKind::WriteRecord)?;
                if request.principal != Identity::Key(*signer) {
                    return Err(LedgerError::Unauthorized(
                        "read request principal is not the signer".into(),
                    ));
                }
            }
            LedgerObject::Account(account) => {
                self.policy(&account.policy)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn invoke(
        &mut self,
        signer: &Ed25519PublicKey,
        id: &InstanceId,
        method: &Method,
    ) -> Result<()> {
        let principal = Identity::Key(*signer);
        match method {
            Method::Evolve { .. } => {
                if !self.is_authorized(&principal, id, rules::EVOLVE)? {
                    return Err(LedgerError::Unauthorized(format!("may not evolve {id}")));
                }
            }
            Method::Transfer { to, amount } => {
                let account = match self.expect_kind(id, ObjectKind::Account)? {
                    LedgerObject::Account(account) => account,
                    _ => return Err(LedgerError::UnknownObject(*id)),
                };
                if !self.is_authorized(&principal, &account.policy, rules::TRANSFER)? {
                    return Err(LedgerError::Unauthorized(format!("may not spend from {id}")));
                }
                if account.balance < *amount {
                    return Err(LedgerError::InsufficientFunds {
                        needed: *amount,
                        available: account.balance,
                    });
                }
                self.expect_kind(to, ObjectKind::Account)?;
            }
            _ => {}
        }

        let entry = self
            .objects
            .get_mut(id)
            .ok_or(LedgerError::UnknownObject(*id))?;
        let found = entry.object.kind();

        match (&mut entry.object, method) {
            (LedgerObject::InstanceSet(set), Method::InstanceSetAdd(member)) => {
                set.insert(*member);
            }
            (LedgerObject::InstanceSet(set), Method::InstanceSetRemove(member)) => {
                set.remove(member);
            }
            (LedgerObject::NameIndex(index), Method::IndexInsert { name, id: target }) => {
                if index.contains(name) {
                    return Err(LedgerError::Rejected(format!("name {name} already indexed")));
                }
                index.insert(name.clone(), *target);
            }
            (LedgerObject::NameIndex(index), Method::IndexRemove { name }) => {
                if index.remove(name).is_none() {
                    return Err(LedgerError::Rejected(format!("name {name} not indexed")));
                }
            }
            (LedgerObject::Credential(credential), Method::SetPublicAttribute { key, value }) => {
                credential.public.insert(key.clone(), value.clone());
            }
            (LedgerObject::Policy(policy), Method::Evolve { description }) => {
                policy.description = description.clone();
            }
            (LedgerObject::Account(account), Method::Transfer { amount, .. }) => {
                account.balance -= amount;
            }
            (_, method) => {
                return Err(LedgerError::UnexpectedKind {
                    id: *id,
                    expected: target_kind(method),
                    found,
                });
            }
        }
        entry.version += 1;

        if let Method::Transfer { to, amount } = method {
            if let Some(Versioned {
                version,
                object: LedgerObject::Account(account),
            }) = self.objects.get_mut(to)
            {
                account.balance += amount;
                *version += 1;
            }
        }
        Ok(())
    }
}

fn target_kind(method: &Method) -> ObjectKind {
    match method {
        Method::InstanceSetAdd(_) | Method::InstanceSetRemove(_) => ObjectKind::InstanceSet,
        Method::IndexInsert { .. } | Method::IndexRemove { .. } => ObjectKind::NameIndex,
        Method::SetPublicAttribute { .. } => ObjectKind::Credential,
        Method::Evolve { .. } => ObjectKind::Policy,
        Method::Transfer { .. } => ObjectKind::Account,
    }
}

/// In-memory ledger implementation.
///
/// Commits are serialized; each either applies completely or not at all.
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    publisher: watch::Sender<LedgerState>,
    tamper_proofs: AtomicBool,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(LedgerState::default());
        Self {
            state: Mutex::new(LedgerState::default()),
            publisher,
            tamper_proofs: AtomicBool::new(false),
        }
    }

    /// A clone of the current state.
    pub fn snapshot(&self) -> LedgerState {
        self.state.lock().unwrap().clone()
    }

    /// Subscribe to committed states.
    pub fn subscribe(&self) -> watch::Receiver<LedgerState> {
        self.publisher.subscribe()
    }

    /// A feed of `project` applied to every committed state.
    ///
    /// Must be called inside a Tokio runtime. The feed closes when the ledger
    /// is dropped.
    pub fn feed<T, F>(&self, project: F) -> watch::Receiver<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&LedgerState) -> T + Send + 'static,
    {
        let mut states = self.publisher.subscribe();
        let (tx, rx) = watch::channel(project(&states.borrow_and_update()));
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let value = project(&states.borrow_and_update());
                if tx.send(value).is_err() {
                    break;
                }
            }
        });
        rx
    }

    /// Feed of the name index at `id`.
    pub fn index_feed(&self, id: InstanceId) -> watch::Receiver<NameIndex> {
        self.feed(move |state| state.name_index(&id))
    }

    /// Place `object` on the ledger outside any transaction.
    pub fn genesis(&self, object: LedgerObject) -> InstanceId {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let id = InstanceId::from_bytes(bytes);
        self.update(|state| {
            state
                .objects
                .insert(id, Versioned { version: 0, object });
        });
        id
    }

    /// Add to a signer's fee balance.
    pub fn credit(&self, key: &Ed25519PublicKey, amount: u64) {
        self.update(|state| {
            *state.balances.entry(*key).or_insert(0) += amount;
        });
    }

    /// Make every subsequent proof fail verification.
    pub fn tamper_proofs(&self, on: bool) {
        self.tamper_proofs.store(on, Ordering::SeqCst);
    }

    fn update(&self, f: impl FnOnce(&mut LedgerState)) {
        let mut state = self.state.lock().unwrap();
        f(&mut state);
        self.publisher.send_replace(state.clone());
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn commit(&self, tx: SignedTransaction) -> Result<CommitReceipt> {
        tx.verify()?;
        let tx_hash = tx.hash()?;

        let mut state = self.state.lock().unwrap();
        let mut next = state.clone();
        for (i, op) in tx.operations.iter().enumerate() {
            if let Err(e) = next.apply(&tx.signer, op) {
                warn!(error = %e, op = i, "commit rejected");
                return Err(e);
            }
        }
        next.height += 1;

        let spawned = tx
            .operations
            .iter()
            .filter_map(|op| match op {
                Operation::Spawn { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        let receipt = CommitReceipt {
            tx_hash,
            index: next.height,
            spawned,
        };

        *state = next;
        self.publisher.send_replace(state.clone());
        debug!(height = receipt.index, ops = tx.operations.len(), "commit applied");
        Ok(receipt)
    }

    async fn proof(&self, id: &InstanceId) -> Result<Proof> {
        let versioned = self
            .state
            .lock()
            .unwrap()
            .objects
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::ProofUnavailable(format!("no object {id}")))?;

        let mut proof = Proof::new(*id, versioned.version, &versioned.object)?;
        if self.tamper_proofs.load(Ordering::SeqCst) {
            if let Some(last) = proof.value.last_mut() {
                *last ^= 0x01;
            }
        }
        Ok(proof)
    }
}

#[async_trait]
impl AuthorizationOracle for MemoryLedger {
    async fn is_authorized(&self, principal: &Identity, action: &Action) -> Result<bool> {
        self.state
            .lock()
            .unwrap()
            .is_authorized(principal, &action.policy, &action.rule)
    }
}
