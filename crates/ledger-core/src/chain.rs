use serde_json::Value;
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::constants::DEFAULT_DIFFICULTY;
use crate::error::Result;
use crate::pow::MineControl;

/// Destination for a whole-chain snapshot.
/// This lives in `ledger-core` so storage backends can depend on the core.
pub trait SnapshotSink {
    /// Write every block in order, replacing whatever the destination held.
    fn write_snapshot(&self, blocks: &[Block]) -> anyhow::Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidReason {
    /// Stored hash differs from the digest of the block's fields.
    HashMismatch,
    /// `previous_hash` differs from the predecessor's hash.
    BrokenLink,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Invalid {
    pub position: usize,
    pub reason: InvalidReason,
}

/// First block (by position) that fails the tamper or linkage check.
///
/// Genesis has no predecessor and is skipped. Proof-of-work is not
/// re-checked: a consistent, linked block passes regardless of its hash.
pub fn find_invalid(blocks: &[Block]) -> Option<Invalid> {
    blocks.windows(2).enumerate().find_map(|(i, pair)| {
        let (prev, current) = (&pair[0], &pair[1]);
        let reason = if !current.is_consistent() {
            InvalidReason::HashMismatch
        } else if current.previous_hash != prev.hash {
            InvalidReason::BrokenLink
        } else {
            return None;
        };
        Some(Invalid {
            position: i + 1,
            reason,
        })
    })
}

pub fn validate_blocks(blocks: &[Block]) -> bool {
    match find_invalid(blocks) {
        None => true,
        Some(invalid) => {
            warn!(
                position = invalid.position,
                reason = ?invalid.reason,
                "chain failed validation"
            );
            false
        }
    }
}

/// Append-only sequence of mined blocks anchored at a genesis block.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: u32,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self::with_difficulty(DEFAULT_DIFFICULTY)
    }

    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            blocks: vec![Block::genesis()],
            difficulty,
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: genesis is present from construction.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn head(&self) -> &Block {
        // never empty, genesis is pushed in the constructor
        &self.blocks[self.blocks.len() - 1]
    }

    /// Link `candidate` to the head, mine it, and push it.
    ///
    /// The chain assigns `index` and `previous_hash`; whatever the caller set
    /// is overwritten.
    pub fn append(&mut self, mut candidate: Block) -> &Block {
        self.link(&mut candidate);
        candidate.mine(self.difficulty);
        self.push(candidate)
    }

    /// Cancellable [`Chain::append`]. On error the chain is unchanged.
    pub fn append_with(&mut self, mut candidate: Block, control: &MineControl) -> Result<&Block> {
        self.link(&mut candidate);
        candidate.mine_with(self.difficulty, control)?;
        Ok(self.push(candidate))
    }

    /// Build the next block for `payload` and append it.
    pub fn record(&mut self, payload: impl Into<Value>) -> &Block {
        let candidate = Block::new(self.blocks.len() as u64, payload);
        self.append(candidate)
    }

    pub fn record_with(&mut self, payload: impl Into<Value>, control: &MineControl) -> Result<&Block> {
        let candidate = Block::new(self.blocks.len() as u64, payload);
        self.append_with(candidate, control)
    }

    pub fn validate(&self) -> bool {
        debug!(len = self.blocks.len(), "validating chain");
        validate_blocks(&self.blocks)
    }

    /// Write a snapshot of every block to `sink`.
    pub fn persist<S: SnapshotSink + ?Sized>(&self, sink: &S) -> Result<()> {
        sink.write_snapshot(&self.blocks)?;
        Ok(())
    }

    fn link(&self, candidate: &mut Block) {
        let expected = self.blocks.len() as u64;
        if candidate.index != expected {
            debug!(index = candidate.index, expected, "reassigning candidate index");
        }
        candidate.index = expected;
        candidate.previous_hash = self.head().hash.clone();
        candidate.hash = candidate.compute_hash();
    }

    fn push(&mut self, block: Block) -> &Block {
        info!(
            index = block.index,
            nonce = block.nonce,
            hash = %block.hash,
            "appended block"
        );
        self.blocks.push(block);
        self.head()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::pow::{leading_zero_nibbles, CancelToken};
    use serde_json::json;
    use std::cell::RefCell;

    fn abc_chain() -> Chain {
        let mut chain = Chain::new();
        for payload in ["A", "B", "C"] {
            chain.record(payload);
        }
        chain
    }

    #[derive(Default)]
    struct MemorySink(RefCell<Vec<Block>>);

    impl SnapshotSink for MemorySink {
        fn write_snapshot(&self, blocks: &[Block]) -> anyhow::Result<()> {
            *self.0.borrow_mut() = blocks.to_vec();
            Ok(())
        }
    }

    struct FailingSink;

    impl SnapshotSink for FailingSink {
        fn write_snapshot(&self, _blocks: &[Block]) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn new_chain_has_only_genesis() {
        let chain = Chain::new();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.difficulty(), 2);
        assert_eq!(chain.head().index, 0);
        assert_eq!(chain.head().previous_hash, "0");
        assert_eq!(chain.head().payload, json!("Genesis Block"));
        assert!(chain.validate());
    }

    #[test]
    fn abc_chain_example() {
        let chain = abc_chain();
        assert_eq!(chain.len(), 4);
        for block in &chain.blocks()[1..] {
            assert!(block.hash.starts_with("00"));
            assert!(block.is_consistent());
        }
        assert!(chain.validate());
    }

    #[test]
    fn append_links_to_head_and_ignores_caller_previous_hash() {
        let mut chain = Chain::new();
        let prev = chain.head().hash.clone();
        let mut candidate = Block::new(1, "A");
        candidate.previous_hash = "bogus".into();
        let appended = chain.append(candidate);
        assert_eq!(appended.previous_hash, prev);
        assert_eq!(appended.index, 1);
        assert!(leading_zero_nibbles(&appended.hash) >= 2);
    }

    #[test]
    fn append_assigns_index_over_caller_value() {
        let mut chain = Chain::with_difficulty(1);
        chain.append(Block::new(7, "A"));
        chain.append(Block::new(7, "B"));
        chain.append(Block::new(0, "C"));
        let indices: Vec<u64> = chain.blocks().iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        for block in chain.blocks() {
            assert!(block.is_consistent());
        }
        assert!(chain.validate());
    }

    #[test]
    fn indices_increase_by_one() {
        let chain = abc_chain();
        for (i, block) in chain.blocks().iter().enumerate() {
            assert_eq!(block.index, i as u64);
        }
    }

    #[test]
    fn tampered_payload_fails_validation() {
        let mut chain = abc_chain();
        chain.blocks[2].payload = json!("TAMPERED");
        assert!(!chain.validate());
        assert_eq!(
            find_invalid(chain.blocks()),
            Some(Invalid {
                position: 2,
                reason: InvalidReason::HashMismatch
            })
        );
    }

    #[test]
    fn tampering_any_field_fails_validation() {
        let tamperings: [fn(&mut Block); 5] = [
            |b| b.payload = json!("X"),
            |b| b.timestamp.push('1'),
            |b| b.index += 1,
            |b| b.previous_hash = "f".repeat(64),
            |b| b.nonce += 1,
        ];
        for tamper in tamperings {
            for position in 1..4 {
                let mut chain = abc_chain();
                tamper(&mut chain.blocks[position]);
                assert!(!chain.validate(), "tampering block {position} went unnoticed");
            }
        }
    }

    #[test]
    fn rehashed_tamper_breaks_the_next_link() {
        let mut chain = abc_chain();
        chain.blocks[1].payload = json!("X");
        chain.blocks[1].hash = chain.blocks[1].compute_hash();
        assert_eq!(
            find_invalid(chain.blocks()),
            Some(Invalid {
                position: 2,
                reason: InvalidReason::BrokenLink
            })
        );
    }

    #[test]
    fn swapped_blocks_fail_validation() {
        let mut chain = abc_chain();
        chain.blocks.swap(2, 3);
        assert!(!chain.validate());
    }

    #[test]
    fn removed_block_fails_validation() {
        let mut chain = abc_chain();
        chain.blocks.remove(2);
        assert!(!chain.validate());
    }

    #[test]
    fn genesis_is_not_checked() {
        let mut chain = Chain::new();
        chain.blocks[0].payload = json!("rewritten");
        assert!(chain.validate());
    }

    #[test]
    fn validation_skips_proof_of_work() {
        let mut chain = Chain::with_difficulty(0);
        chain.record("A");
        chain.record("B");
        assert!(chain.validate());
        assert_eq!(chain.blocks()[1].nonce, 0);
        assert_eq!(chain.blocks()[2].nonce, 0);
    }

    #[test]
    fn append_with_cancelled_leaves_chain_unchanged() {
        let mut chain = Chain::with_difficulty(8);
        let token = CancelToken::new();
        token.cancel();
        let control = MineControl::new().with_token(token);
        let err = chain.record_with("A", &control).unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled { index: 1, .. }));
        assert_eq!(chain.len(), 1);
        assert!(chain.validate());
    }

    #[test]
    fn append_with_default_control_appends() {
        let mut chain = Chain::new();
        let block = chain.record_with(json!({ "event": "scan" }), &MineControl::new()).unwrap();
        assert!(block.hash.starts_with("00"));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn persist_writes_every_block() {
        let chain = abc_chain();
        let sink = MemorySink::default();
        chain.persist(&sink).unwrap();
        assert_eq!(sink.0.borrow().as_slice(), chain.blocks());
    }

    #[test]
    fn persist_failure_surfaces_and_keeps_chain() {
        let chain = abc_chain();
        let err = chain.persist(&FailingSink).unwrap_err();
        assert!(matches!(err, LedgerError::Sink(_)));
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(chain.len(), 4);
        assert!(chain.validate());
    }
}
