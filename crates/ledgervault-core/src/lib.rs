//! # LedgerVault Core
//!
//! Ledger-facing primitives for LedgerVault: object ids, the object model,
//! pending transactions, the external capability traits, and feed
//! projections.
//!
//! This crate does not talk to any network. The ledger, the re-encryption
//! collective, and the authorization oracle are traits the host wires in.
//!
//! ## Key Types
//!
//! - [`InstanceId`] - Identifier of a ledger object
//! - [`LedgerObject`] - Everything the vault records on the ledger
//! - [`Transaction`] - A local queue of operations, committed atomically
//! - [`Ledger`], [`Reencryptor`], [`AuthorizationOracle`] - External capabilities
//! - [`Projection`] - Read-only mirror of an upstream snapshot feed

pub mod crypto;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod object;
pub mod transaction;
pub mod types;

pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, LedgerError, ReencryptError, Result};
pub use feed::Projection;
pub use ledger::{Action, AuthorizationOracle, Ledger, Proof, Reencryptor};
pub use object::{
    rules, Account, CollectiveWriteRecord, Credential, Identity, InstanceSet, LedgerObject,
    NameIndex, ObjectKind, PolicyObject, ReadRequestRecord, Rule, ALIAS_ATTRIBUTE,
};
pub use transaction::{CommitReceipt, Method, Operation, SignedTransaction, Transaction};
pub use types::InstanceId;
