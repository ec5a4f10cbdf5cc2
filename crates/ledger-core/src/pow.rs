use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::block::{finish_digest, preimage_prefix, Block};
use crate::constants::CANCEL_CHECK_INTERVAL;
use crate::error::{LedgerError, Result};

/// Number of leading `'0'` hex characters in `hash`.
pub fn leading_zero_nibbles(hash: &str) -> u32 {
    hash.bytes().take_while(|b| *b == b'0').count() as u32
}

pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    leading_zero_nibbles(hash) >= difficulty
}

/// Shared flag a producer can flip to stop an in-flight mining search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stop conditions for a mining search. The default never stops.
#[derive(Clone, Debug, Default)]
pub struct MineControl {
    token: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl MineControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Err when the search for block `index` must stop at `nonce`.
    pub fn check(&self, index: u64, nonce: u64) -> Result<()> {
        if self.token.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(LedgerError::Cancelled { index, nonce });
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(LedgerError::DeadlineExceeded { index, nonce });
        }
        Ok(())
    }
}

impl Block {
    /// Same search as [`Block::mine`], polling `control` every
    /// `CANCEL_CHECK_INTERVAL` attempts.
    ///
    /// On error the block keeps the last attempted nonce with its matching
    /// hash: consistent, but not mined.
    pub fn mine_with(&mut self, difficulty: u32, control: &MineControl) -> Result<()> {
        debug!(index = self.index, difficulty, "mining block (cancellable)");
        let prefix = preimage_prefix(self.index, &self.timestamp, &self.payload, &self.previous_hash);
        let mut attempts = 0u64;
        while !meets_difficulty(&self.hash, difficulty) {
            if attempts % CANCEL_CHECK_INTERVAL == 0 {
                if let Err(e) = control.check(self.index, self.nonce) {
                    warn!(index = self.index, nonce = self.nonce, "mining stopped: {e}");
                    return Err(e);
                }
            }
            attempts += 1;
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = finish_digest(&prefix, self.nonce);
        }
        Ok(())
    }
}

/// Mines `block` by searching nonces in parallel across the rayon pool.
///
/// Any satisfying nonce above the current one is accepted, so the result can
/// differ from the sequential search while still meeting the same predicate.
pub fn mine_parallel(block: &mut Block, difficulty: u32, control: &MineControl) -> Result<()> {
    if meets_difficulty(&block.hash, difficulty) {
        return Ok(());
    }
    let index = block.index;
    let prefix = preimage_prefix(index, &block.timestamp, &block.payload, &block.previous_hash);

    let found = (block.nonce.saturating_add(1)..u64::MAX)
        .into_par_iter()
        .find_map_any(|nonce| {
            if nonce % CANCEL_CHECK_INTERVAL == 0 {
                if let Err(e) = control.check(index, nonce) {
                    return Some(Err(e));
                }
            }
            let hash = finish_digest(&prefix, nonce);
            meets_difficulty(&hash, difficulty).then_some(Ok((nonce, hash)))
        });

    match found {
        Some(Ok((nonce, hash))) => {
            block.nonce = nonce;
            block.hash = hash;
            info!(index, nonce, hash = %block.hash, "mined block in parallel");
            Ok(())
        }
        Some(Err(e)) => {
            warn!(index, "parallel mining stopped: {e}");
            Err(e)
        }
        None => Err(LedgerError::NonceSpaceExhausted { index }),
    }
}
