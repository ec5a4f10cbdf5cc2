//! Append-only, hash-linked event ledger with a local proof-of-work step.
//!
//! A [`Chain`] starts with an unmined genesis block. Each appended [`Block`]
//! is linked to the current head, mined until its hex digest has the chain's
//! difficulty in leading zeros, then pushed. [`Chain::validate`] detects
//! tampered fields and broken links; [`Chain::persist`] hands a snapshot to a
//! [`SnapshotSink`].

pub mod block;
pub mod chain;
pub mod constants;
pub mod error;
pub mod pow;
pub mod shared;

pub use block::{canonical_payload, digest, Block};
pub use chain::{find_invalid, validate_blocks, Chain, Invalid, InvalidReason, SnapshotSink};
pub use error::{LedgerError, Result};
pub use pow::{CancelToken, MineControl};
pub use shared::SharedChain;
