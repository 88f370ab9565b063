//! Wiring between the in-memory ledger and the vault's collections.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ledgervault::core::{InstanceId, LedgerObject, Reencryptor};
use ledgervault::{
    AddressBook, Capabilities, Contact, Contacts, Group, Groups, LinkedCollection, NamedAction,
    SecretStore, SecretStoreConfig,
};
use ledgervault_testkit::{MemoryLedger, TestFixture};
use tokio::sync::watch;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn capabilities(fixture: &TestFixture) -> Capabilities {
    Capabilities {
        ledger: fixture.ledger.clone(),
        collective: fixture.collective.clone(),
        oracle: fixture.ledger.clone(),
    }
}

pub fn store(fixture: &TestFixture, index: InstanceId) -> SecretStore {
    store_with(fixture, index, fixture.collective.clone(), SecretStoreConfig::default())
}

pub fn store_with(
    fixture: &TestFixture,
    index: InstanceId,
    collective: Arc<dyn Reencryptor>,
    config: SecretStoreConfig,
) -> SecretStore {
    let capabilities = Capabilities {
        collective,
        ..capabilities(fixture)
    };
    SecretStore::new(
        capabilities,
        fixture.keypair.clone(),
        index,
        fixture.ledger.index_feed(index),
        config,
    )
}

pub fn contacts(ledger: &MemoryLedger, set_id: InstanceId) -> Contacts {
    let feed = ledger.feed(move |state| {
        state
            .members(&set_id)
            .into_iter()
            .filter_map(|(id, object)| match object {
                LedgerObject::Credential(credential) => Some(Contact { id, credential }),
                _ => None,
            })
            .collect::<Vec<_>>()
    });
    LinkedCollection::new(set_id, feed)
}

pub fn groups(ledger: &MemoryLedger, set_id: InstanceId) -> Groups {
    let feed = ledger.feed(move |state| {
        state
            .members(&set_id)
            .into_iter()
            .filter_map(|(id, object)| match object {
                LedgerObject::Policy(policy) => Some(Group { id, policy }),
                _ => None,
            })
            .collect::<Vec<_>>()
    });
    LinkedCollection::new(set_id, feed)
}

pub fn actions(ledger: &MemoryLedger, set_id: InstanceId) -> LinkedCollection<NamedAction> {
    let feed = ledger.feed(move |state| {
        state
            .members(&set_id)
            .into_iter()
            .filter_map(|(id, object)| match object {
                LedgerObject::Policy(policy) => {
                    let account = NamedAction::account_id(&id);
                    Some(NamedAction {
                        id,
                        policy,
                        account: state.contains(&account).then_some(account),
                    })
                }
                _ => None,
            })
            .collect::<Vec<_>>()
    });
    LinkedCollection::new(set_id, feed)
}

pub fn address_book(fixture: &TestFixture) -> AddressBook {
    AddressBook::new(
        contacts(&fixture.ledger, fixture.create_set()),
        groups(&fixture.ledger, fixture.create_set()),
        actions(&fixture.ledger, fixture.create_set()),
    )
}

/// Wait until the latest snapshot satisfies `pred`.
pub async fn eventually<T>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("feed did not settle")
        .expect("feed closed");
}
