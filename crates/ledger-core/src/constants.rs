pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_DIFFICULTY: u32 = 2;
pub const GENESIS_PAYLOAD: &str = "Genesis Block";
pub const GENESIS_PREVIOUS_HASH: &str = "0";
/// Local wall-clock time with microseconds, e.g. `2024-01-01 12:00:00.000123`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
/// Nonce attempts between cancellation/deadline polls.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;
