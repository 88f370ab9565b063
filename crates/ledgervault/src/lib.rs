//! # LedgerVault
//!
//! Encrypted file storage and an address book whose state lives on a
//! permissioned ledger.
//!
//! ## Overview
//!
//! - **Secret store**: files are sealed with AES-192-GCM under a fresh key;
//!   the key is wrapped toward a re-encryption collective and bound to a
//!   policy. Reading requires a paid read request the collective checks.
//! - **Linked collections**: contacts, groups and actions mirrored from
//!   upstream ledger feeds. Mutations are queued into transactions; the local
//!   view changes only when the feed re-emits.
//!
//! ## Key Concepts
//!
//! - **Transaction**: nothing touches the ledger before `commit`.
//! - **Projection**: local state is a read-only mirror of a ledger feed.
//! - **Collective**: the only party able to release a file key.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ledgervault::{Capabilities, SecretStore, SecretStoreConfig};
//! use ledgervault::core::{InstanceId, Keypair, NameIndex};
//! use ledgervault::seal::X25519StaticSecret;
//! use tokio::sync::watch;
//!
//! async fn example(
//!     capabilities: Capabilities,
//!     index_id: InstanceId,
//!     index_feed: watch::Receiver<NameIndex>,
//!     policy: InstanceId,
//! ) -> ledgervault::Result<()> {
//!     let store = SecretStore::new(
//!         capabilities,
//!         Keypair::generate(),
//!         index_id,
//!         index_feed,
//!         SecretStoreConfig::default(),
//!     );
//!
//!     let mut tx = store.begin();
//!     let id = store.store_file(&mut tx, policy, "report.pdf", b"quarterly numbers")?;
//!     tx.commit().await.map_err(ledgervault::VaultError::Transaction)?;
//!
//!     let reader = X25519StaticSecret::generate();
//!     let data = store.retrieve_file(id, &reader, None).await?;
//!     assert_eq!(data, b"quarterly numbers");
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `ledgervault::core` - Ledger object model, transactions, capabilities
//! - `ledgervault::seal` - Envelope codec and key wrapping

pub mod address_book;
pub mod collection;
pub mod error;
pub mod secret_store;

pub use ledgervault_core as core;
pub use ledgervault_seal as seal;

pub use address_book::{
    Actions, AddressBook, Contact, ContactSpec, Contacts, Group, Groups, NamedAction,
};
pub use collection::{LinkedCollection, Member};
pub use error::{Result, VaultError};
pub use secret_store::{Capabilities, Milestone, Progress, SecretStore, SecretStoreConfig};

pub use ledgervault_core::{Identity, InstanceId, Keypair, Transaction};
