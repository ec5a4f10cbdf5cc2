use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::constants::{GENESIS_PAYLOAD, GENESIS_PREVIOUS_HASH, TIMESTAMP_FORMAT};
use crate::pow::meets_difficulty;

/// One ledger entry. Field order here is the on-disk record order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    #[serde(alias = "data")]
    pub payload: Value,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
}

impl Block {
    /// Build an unmined candidate stamped with the current local time.
    ///
    /// `previous_hash` starts empty; `Chain::append` is the only place that
    /// links a block to its predecessor.
    pub fn new(index: u64, payload: impl Into<Value>) -> Self {
        Self::with_timestamp(index, now_timestamp(), payload)
    }

    pub fn with_timestamp(index: u64, timestamp: impl Into<String>, payload: impl Into<Value>) -> Self {
        let mut block = Self {
            index,
            timestamp: timestamp.into(),
            payload: payload.into(),
            previous_hash: String::new(),
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// The fixed first block of every chain. Never mined.
    pub fn genesis() -> Self {
        let mut block = Self::new(0, GENESIS_PAYLOAD);
        block.previous_hash = GENESIS_PREVIOUS_HASH.to_string();
        block.hash = block.compute_hash();
        block
    }

    pub fn compute_hash(&self) -> String {
        digest(
            self.index,
            &self.timestamp,
            &self.payload,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// True when the stored hash matches the block's current fields.
    pub fn is_consistent(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Increment the nonce until the hash carries `difficulty` leading `'0'`s.
    ///
    /// Blocks the calling thread with no upper bound. Use
    /// [`Block::mine_with`] when the search must be cancellable.
    pub fn mine(&mut self, difficulty: u32) {
        debug!(index = self.index, difficulty, "mining block");
        let prefix = preimage_prefix(self.index, &self.timestamp, &self.payload, &self.previous_hash);
        while !meets_difficulty(&self.hash, difficulty) {
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = finish_digest(&prefix, self.nonce);
        }
    }
}

/// SHA-256 over the decimal index, timestamp, canonical payload, previous
/// hash and decimal nonce, concatenated without separators, as lowercase hex.
///
/// Field boundaries are not delimited, so two different field splits could in
/// principle produce the same preimage. Existing ledgers depend on this exact
/// encoding.
///
/// Only string payloads are byte-compatible with ledgers written by tools
/// that stringify records in their own native form. Structured payloads
/// always hash as compact JSON (see [`canonical_payload`]), so a record
/// hashed elsewhere from a language-specific repr will not match.
pub fn digest(index: u64, timestamp: &str, payload: &Value, previous_hash: &str, nonce: u64) -> String {
    finish_digest(&preimage_prefix(index, timestamp, payload, previous_hash), nonce)
}

/// Strings hash verbatim; anything else hashes as compact JSON.
pub fn canonical_payload(payload: &Value) -> Cow<'_, str> {
    match payload {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

/// Hasher state after absorbing every field except the nonce.
pub(crate) fn preimage_prefix(index: u64, timestamp: &str, payload: &Value, previous_hash: &str) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(index.to_string().as_bytes());
    hasher.update(timestamp.as_bytes());
    hasher.update(canonical_payload(payload).as_bytes());
    hasher.update(previous_hash.as_bytes());
    hasher
}

pub(crate) fn finish_digest(prefix: &Sha256, nonce: u64) -> String {
    let mut hasher = prefix.clone();
    hasher.update(nonce.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
