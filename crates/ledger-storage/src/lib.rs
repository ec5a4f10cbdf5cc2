//! JSON snapshots of a ledger chain.
//!
//! Each file holds one whole chain as a pretty-printed array of block
//! records. Files are written once and never merged; readers treat every file
//! as an independent snapshot.

pub mod json_store;

pub use json_store::{read_snapshot, write_snapshot, JsonSnapshot, LedgerDir, Snapshot};
