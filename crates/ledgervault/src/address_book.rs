//! The address book: contacts, groups and actions.
//!
//! Each is a [`LinkedCollection`] over its own instance set. Creating an
//! entry spawns its ledger objects and links the new id in the same
//! transaction.

use ledgervault_core::{
    rules, Account, Credential, Ed25519PublicKey, Identity, InstanceId, LedgerObject, Method,
    PolicyObject, Transaction, ALIAS_ATTRIBUTE,
};
use tracing::info;

use crate::collection::{LinkedCollection, Member};

/// A contact: a credential carrying an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: InstanceId,
    pub credential: Credential,
}

impl Member for Contact {
    const KIND: &'static str = "contact";

    fn id(&self) -> InstanceId {
        self.id
    }

    fn name(&self) -> &str {
        self.credential.alias().unwrap_or_default()
    }

    fn rename_operation(&self, new_name: &str) -> (InstanceId, Method) {
        (
            self.id,
            Method::SetPublicAttribute {
                key: ALIAS_ATTRIBUTE.to_string(),
                value: new_name.as_bytes().to_vec(),
            },
        )
    }
}

/// A group: a policy whose description is its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: InstanceId,
    pub policy: PolicyObject,
}

impl Member for Group {
    const KIND: &'static str = "group";

    fn id(&self) -> InstanceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.policy.description
    }

    fn rename_operation(&self, new_name: &str) -> (InstanceId, Method) {
        evolve(self.id, new_name)
    }
}

/// An action: a signing policy paired with a value-transfer account only it
/// can spend from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedAction {
    /// The signing policy.
    pub id: InstanceId,
    pub policy: PolicyObject,
    /// The paired account, when it exists.
    pub account: Option<InstanceId>,
}

impl NamedAction {
    /// Id of the account paired with the action whose signing policy is
    /// `policy`.
    pub fn account_id(policy: &InstanceId) -> InstanceId {
        InstanceId::derive_child(policy, "coin")
    }
}

impl Member for NamedAction {
    const KIND: &'static str = "action";

    fn id(&self) -> InstanceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.policy.description
    }

    fn rename_operation(&self, new_name: &str) -> (InstanceId, Method) {
        evolve(self.id, new_name)
    }
}

fn evolve(id: InstanceId, description: &str) -> (InstanceId, Method) {
    (
        id,
        Method::Evolve {
            description: description.to_string(),
        },
    )
}

/// What a new contact is made of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSpec {
    pub alias: String,
    pub owner: Ed25519PublicKey,
}

impl ContactSpec {
    pub fn new(alias: impl Into<String>, owner: Ed25519PublicKey) -> Self {
        Self {
            alias: alias.into(),
            owner,
        }
    }
}

pub type Contacts = LinkedCollection<Contact>;
pub type Groups = LinkedCollection<Group>;
pub type Actions = LinkedCollection<NamedAction>;

impl LinkedCollection<Contact> {
    /// Queue a new credential for `spec` and link it.
    pub fn create(&self, tx: &mut Transaction, spec: &ContactSpec) -> InstanceId {
        let credential = Credential::with_alias(spec.owner, &spec.alias);
        let id = tx.spawn(LedgerObject::Credential(credential));
        self.link(tx, id);

        info!(%id, alias = %spec.alias, "contact queued");
        id
    }
}

impl LinkedCollection<Group> {
    /// Queue a new group policy that `signers` may sign for and evolve, and
    /// link it.
    pub fn create(&self, tx: &mut Transaction, name: &str, signers: &[Identity]) -> Group {
        let policy = PolicyObject::basic(name, signers);
        let id = tx.spawn(LedgerObject::Policy(policy.clone()));
        self.link(tx, id);

        info!(%id, name, signers = signers.len(), "group queued");
        Group { id, policy }
    }
}

impl LinkedCollection<NamedAction> {
    /// Queue a new action and link it.
    ///
    /// Spawns the signing policy for `signers`, a coin policy whose transfer
    /// rule names only the signing policy, and the account governed by the
    /// coin policy at [`NamedAction::account_id`].
    pub fn create(
        &self,
        tx: &mut Transaction,
        description: &str,
        signers: &[Identity],
    ) -> NamedAction {
        let policy = PolicyObject::basic(description, signers);
        let id = tx.spawn(LedgerObject::Policy(policy.clone()));

        let coin_policy = PolicyObject::new(format!("{description}:coin"))
            .with_rule(rules::TRANSFER, vec![Identity::Policy(id)]);
        let coin_policy_id = tx.spawn(LedgerObject::Policy(coin_policy));

        let account = NamedAction::account_id(&id);
        tx.spawn_at(
            account,
            LedgerObject::Account(Account {
                balance: 0,
                policy: coin_policy_id,
            }),
        );
        self.link(tx, id);

        info!(%id, %account, description, "action queued");
        NamedAction {
            id,
            policy,
            account: Some(account),
        }
    }
}

/// Contacts, groups and actions of one user.
#[derive(Debug)]
pub struct AddressBook {
    pub contacts: Contacts,
    pub groups: Groups,
    pub actions: Actions,
}

impl AddressBook {
    pub fn new(contacts: Contacts, groups: Groups, actions: Actions) -> Self {
        Self {
            contacts,
            groups,
            actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ledgervault_core::{Keypair, Operation};
    use ledgervault_testkit::MemoryLedger;
    use tokio::sync::watch;

    fn tx() -> Transaction {
        Transaction::new(Arc::new(MemoryLedger::new()), Keypair::generate())
    }

    fn empty<T: Member>(byte: u8) -> LinkedCollection<T> {
        let (_feed, rx) = watch::channel(Vec::new());
        LinkedCollection::new(InstanceId::from_bytes([byte; 32]), rx)
    }

    #[tokio::test]
    async fn test_create_contact_spawns_then_links() {
        let contacts: Contacts = empty(1);
        let owner = Keypair::generate().public_key();
        let mut tx = tx();

        let id = contacts.create(&mut tx, &ContactSpec::new("alice", owner));

        assert_eq!(tx.len(), 2);
        match &tx.operations()[0] {
            Operation::Spawn {
                id: spawned,
                object: LedgerObject::Credential(cred),
            } => {
                assert_eq!(*spawned, id);
                assert_eq!(cred.alias(), Some("alice"));
                assert_eq!(cred.owner, owner);
            }
            other => panic!("unexpected operation {other:?}"),
        }
        assert_eq!(
            tx.operations()[1],
            Operation::Invoke {
                id: contacts.set_id(),
                method: Method::InstanceSetAdd(id),
            }
        );
        assert!(contacts.is_empty());
    }

    #[tokio::test]
    async fn test_create_group_uses_basic_policy() {
        let groups: Groups = empty(2);
        let signer = Identity::Key(Keypair::generate().public_key());
        let mut tx = tx();

        let group = groups.create(&mut tx, "Finance", &[signer]);

        assert_eq!(group.policy.description, "Finance");
        assert_eq!(group.policy.identities_for(rules::SIGN), Some(&[signer][..]));
        assert_eq!(group.policy.identities_for(rules::EVOLVE), Some(&[signer][..]));
        assert_eq!(tx.len(), 2);
    }

    #[tokio::test]
    async fn test_create_action_pairs_account_with_own_id() {
        let actions: Actions = empty(3);
        let signer = Identity::Key(Keypair::generate().public_key());
        let mut tx = tx();

        let action = actions.create(&mut tx, "Pay rent", &[signer]);

        assert_eq!(action.account, Some(InstanceId::derive_child(&action.id, "coin")));
        let ops = tx.operations();
        assert_eq!(ops.len(), 4);

        let coin_policy_id = match &ops[1] {
            Operation::Spawn {
                id,
                object: LedgerObject::Policy(coin),
            } => {
                assert_eq!(coin.rules.len(), 1);
                assert_eq!(
                    coin.identities_for(rules::TRANSFER),
                    Some(&[Identity::Policy(action.id)][..])
                );
                *id
            }
            other => panic!("unexpected operation {other:?}"),
        };
        assert!(matches!(
            &ops[2],
            Operation::Spawn { id, object: LedgerObject::Account(acct) }
                if Some(*id) == action.account && acct.policy == coin_policy_id
        ));
        assert_eq!(
            ops[3],
            Operation::Invoke {
                id: actions.set_id(),
                method: Method::InstanceSetAdd(action.id),
            }
        );
    }

    #[test]
    fn test_contact_rename_targets_alias() {
        let contact = Contact {
            id: InstanceId::from_bytes([4; 32]),
            credential: Credential::with_alias(Keypair::generate().public_key(), "bob"),
        };

        assert_eq!(contact.name(), "bob");
        assert_eq!(
            contact.rename_operation("robert"),
            (
                contact.id,
                Method::SetPublicAttribute {
                    key: ALIAS_ATTRIBUTE.to_string(),
                    value: b"robert".to_vec(),
                }
            )
        );
    }
}
