//! Linked collections: reactive views over a ledger instance set.
//!
//! A collection never changes its own membership. `link`, `unlink` and
//! `rename` queue operations into a transaction; members appear, disappear
//! or change name only when the upstream feed re-emits after commit.

use tokio::sync::watch;
use tracing::debug;

use ledgervault_core::{InstanceId, Method, Projection, Transaction};

use crate::error::{Result, VaultError};

/// Something a collection can hold.
pub trait Member: Clone + Send + Sync + 'static {
    /// Noun used in error messages.
    const KIND: &'static str;

    /// Ledger id linked into the backing set.
    fn id(&self) -> InstanceId;

    /// Display name, matched exactly by `find`.
    fn name(&self) -> &str;

    /// The single operation that renames this member.
    fn rename_operation(&self, new_name: &str) -> (InstanceId, Method);
}

/// A collection backed by the instance set `set_id` and mirrored from an
/// upstream feed of resolved members.
#[derive(Debug)]
pub struct LinkedCollection<T> {
    set_id: InstanceId,
    members: Projection<Vec<T>>,
}

impl<T: Member> LinkedCollection<T> {
    /// Follow `upstream`, which publishes the members of `set_id` in arrival
    /// order.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(set_id: InstanceId, upstream: watch::Receiver<Vec<T>>) -> Self {
        Self {
            set_id,
            members: Projection::follow(upstream),
        }
    }

    /// Id of the backing instance set.
    pub fn set_id(&self) -> InstanceId {
        self.set_id
    }

    /// Queue adding `id` to the backing set. Linking twice is harmless.
    pub fn link(&self, tx: &mut Transaction, id: InstanceId) {
        debug!(set = %self.set_id, %id, kind = T::KIND, "queue link");
        tx.invoke(self.set_id, Method::InstanceSetAdd(id));
    }

    /// Queue removing `id` from the backing set.
    pub fn unlink(&self, tx: &mut Transaction, id: InstanceId) {
        debug!(set = %self.set_id, %id, kind = T::KIND, "queue unlink");
        tx.invoke(self.set_id, Method::InstanceSetRemove(id));
    }

    /// Queue renaming the member currently named `old`.
    ///
    /// Queues nothing and fails if no member has that name.
    pub fn rename(&self, tx: &mut Transaction, old: &str, new: &str) -> Result<()> {
        let member = self
            .find(old)
            .ok_or_else(|| VaultError::NotFound(format!("no {} named {old}", T::KIND)))?;

        let (id, method) = member.rename_operation(new);
        tx.invoke(id, method);
        Ok(())
    }

    /// First member named exactly `name`.
    pub fn find(&self, name: &str) -> Option<T> {
        self.members
            .with(|members| members.iter().find(|m| m.name() == name).cloned())
    }

    /// Whether `id` is currently a member.
    pub fn contains(&self, id: &InstanceId) -> bool {
        self.members
            .with(|members| members.iter().any(|m| m.id() == *id))
    }

    /// Current members in arrival order.
    pub fn members(&self) -> Vec<T> {
        self.members.get()
    }

    pub fn len(&self) -> usize {
        self.members.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.members.with(Vec::is_empty)
    }

    /// Subscribe to membership snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.members.subscribe()
    }
}
