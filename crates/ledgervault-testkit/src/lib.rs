//! # LedgerVault Testkit
//!
//! Testing utilities for LedgerVault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **MemoryLedger**: an atomic in-memory ledger that publishes every
//!   committed state and answers authorization queries from its policies
//! - **MemoryCollective**: a single-node re-encryption collective that
//!   enforces read policies the way the real one does
//! - **Fixtures**: funded users sharing a ledger and collective
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust
//! use ledgervault_testkit::fixtures::TestFixture;
//!
//! let owner = TestFixture::new();
//! let reader = owner.peer();
//! let policy = owner.create_policy("Finance", &[reader.identity()]);
//! assert!(owner.ledger.snapshot().contains(&policy));
//! ```
//!
//! ## Feeds
//!
//! Upstream feeds are derived from committed states:
//!
//! ```rust,ignore
//! let index = fixture.create_index();
//! let feed = fixture.ledger.index_feed(index);
//! let members = fixture.ledger.feed(move |state| state.members(&set_id));
//! ```

pub mod collective;
pub mod fixtures;
pub mod generators;
pub mod ledger;

pub use collective::MemoryCollective;
pub use fixtures::{multi_party_fixtures, TestFixture, DEFAULT_FUNDS};
pub use generators::FileParams;
pub use ledger::{LedgerState, MemoryLedger, Versioned};
