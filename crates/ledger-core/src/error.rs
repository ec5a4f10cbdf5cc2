use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("mining of block {index} cancelled at nonce {nonce}")]
    Cancelled { index: u64, nonce: u64 },

    #[error("mining of block {index} hit its deadline at nonce {nonce}")]
    DeadlineExceeded { index: u64, nonce: u64 },

    #[error("nonce space exhausted mining block {index}")]
    NonceSpaceExhausted { index: u64 },

    #[error("chain lock poisoned by a panicked appender")]
    Poisoned,

    /// Persist failure reported by a snapshot sink.
    #[error(transparent)]
    Sink(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
