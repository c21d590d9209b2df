//! Chain Core
//!
//! Single-node ledger: hash-linked blocks of signed value transfers plus
//! per-address balances.
//!
//! # Architecture
//!
//! - **Canonical Hashing**: Tagged, length-prefixed SHA-256 over typed fields
//! - **Signed Transfers**: Ed25519 over the transaction's content hash
//! - **Merkle Roots**: Balanced tree over transaction ids, with inclusion proofs
//! - **Single Writer**: One owner of the ledger; share it through [`actor`]
//!
//! # Invariants
//!
//! - Money conservation: every admitted transfer debits and credits the same amount
//! - No overdraft: balances never go negative
//! - Hash linking: each block's `prev_hash` is its parent's header hash
//! - Append-only: sealed blocks are never modified or removed

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod block;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod hasher;
pub mod ledger;
pub mod merkle;
pub mod metrics;
pub mod transaction;

// Re-exports
pub use actor::{spawn_ledger_actor, LedgerHandle};
pub use block::{aggregate_root, Block, BlockHeader};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use crypto::{Address, AddressKeyVerifier, KeyDirectory, KeyPair, PublicKey, Signature, SignatureVerifier};
pub use error::{Error, Result};
pub use hasher::{CanonicalHasher, Digest, Field};
pub use ledger::{audit_chain, AuditFinding, Ledger, Submission};
pub use merkle::{MerkleProof, MerkleTree};
pub use metrics::Metrics;
pub use transaction::Transaction;
