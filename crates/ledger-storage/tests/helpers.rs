use std::fs;

use ledger_core::Chain;
use tempfile::{tempdir, TempDir};

pub fn create_temp_dir() -> (TempDir, std::path::PathBuf) {
    // Create a temporary directory for the ledger files
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let dir_path = temp_dir.path().to_path_buf();
    (temp_dir, dir_path)
}

pub fn remove_temp_dir(temp_dir: TempDir) {
    let dir_path = temp_dir.path().to_path_buf();
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&dir_path);
    // Verify the directory is removed
    assert!(!dir_path.exists(), "Ledger directory should be removed");
}

pub fn chain_with(payloads: &[&str], difficulty: u32) -> Chain {
    let mut chain = Chain::with_difficulty(difficulty);
    for payload in payloads {
        chain.record(*payload);
    }
    chain
}
