use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::block::Block;
use crate::chain::{Chain, SnapshotSink};
use crate::error::{LedgerError, Result};
use crate::pow::MineControl;

/// Thread-safe handle to one [`Chain`] for concurrent producers.
///
/// The lock is held across read-head/mine/push, so appenders run one at a
/// time and a second appender blocks until the first block lands.
#[derive(Clone, Debug)]
pub struct SharedChain {
    inner: Arc<Mutex<Chain>>,
}

impl SharedChain {
    pub fn new(chain: Chain) -> Self {
        Self {
            inner: Arc::new(Mutex::new(chain)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Chain>> {
        self.inner.lock().map_err(|_| LedgerError::Poisoned)
    }

    pub fn append(&self, candidate: Block) -> Result<Block> {
        Ok(self.lock()?.append(candidate).clone())
    }

    pub fn append_with(&self, candidate: Block, control: &MineControl) -> Result<Block> {
        Ok(self.lock()?.append_with(candidate, control)?.clone())
    }

    /// Assigns the next index under the lock, so concurrent producers never
    /// race on index selection.
    pub fn record(&self, payload: impl Into<Value>) -> Result<Block> {
        Ok(self.lock()?.record(payload).clone())
    }

    pub fn record_with(&self, payload: impl Into<Value>, control: &MineControl) -> Result<Block> {
        Ok(self.lock()?.record_with(payload, control)?.clone())
    }

    pub fn head(&self) -> Result<Block> {
        Ok(self.lock()?.head().clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn validate(&self) -> Result<bool> {
        Ok(self.lock()?.validate())
    }

    /// Copy of every block at this instant.
    pub fn snapshot(&self) -> Result<Vec<Block>> {
        Ok(self.lock()?.blocks().to_vec())
    }

    pub fn persist<S: SnapshotSink + ?Sized>(&self, sink: &S) -> Result<()> {
        self.lock()?.persist(sink)
    }
}

impl From<Chain> for SharedChain {
    fn from(chain: Chain) -> Self {
        Self::new(chain)
    }
}
