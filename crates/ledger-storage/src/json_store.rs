use anyhow::{Context, Result};
use ledger_core::{validate_blocks, Block, Chain, SnapshotSink};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const SNAPSHOT_PREFIX: &str = "security_log_";
const SNAPSHOT_EXTENSION: &str = "json";

/// Write `blocks` to `path` as a pretty JSON array, creating the parent
/// directory. Any existing file is replaced.
pub fn write_snapshot<P: AsRef<Path>>(path: P, blocks: &[Block]) -> Result<()> {
  let path = path.as_ref();
  if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
    fs::create_dir_all(dir)
      .with_context(|| format!("creating ledger directory {}", dir.display()))?;
  }
  let mut bytes = serde_json::to_vec_pretty(blocks)?;
  bytes.push(b'\n');
  fs::write(path, bytes).with_context(|| format!("writing snapshot {}", path.display()))?;
  info!(path = %path.display(), blocks = blocks.len(), "chain snapshot written");
  Ok(())
}

pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Vec<Block>> {
  let path = path.as_ref();
  let bytes = fs::read(path).with_context(|| format!("reading snapshot {}", path.display()))?;
  let blocks = serde_json::from_slice(&bytes)
    .with_context(|| format!("parsing snapshot {}", path.display()))?;
  Ok(blocks)
}

/// A single snapshot file used as a [`SnapshotSink`].
#[derive(Clone, Debug)]
pub struct JsonSnapshot {
  path: PathBuf,
}

impl JsonSnapshot {
  pub fn new<P: Into<PathBuf>>(path: P) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl SnapshotSink for JsonSnapshot {
  fn write_snapshot(&self, blocks: &[Block]) -> Result<()> {
    write_snapshot(&self.path, blocks)
  }
}

/// One parsed file from a ledger directory.
#[derive(Clone, Debug)]
pub struct Snapshot {
  pub path: PathBuf,
  pub blocks: Vec<Block>,
}

impl Snapshot {
  pub fn head(&self) -> Option<&Block> {
    self.blocks.last()
  }

  pub fn is_valid(&self) -> bool {
    validate_blocks(&self.blocks)
  }
}

/// Directory of timestamped snapshot files. Created on first write.
#[derive(Clone, Debug)]
pub struct LedgerDir {
  root: PathBuf,
}

impl LedgerDir {
  pub fn open<P: Into<PathBuf>>(root: P) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn snapshot_path(&self, unix_secs: u64) -> PathBuf {
    self
      .root
      .join(format!("{SNAPSHOT_PREFIX}{unix_secs}.{SNAPSHOT_EXTENSION}"))
  }

  /// Persist `chain` under a name stamped with the current Unix time.
  pub fn persist(&self, chain: &Chain) -> Result<PathBuf> {
    let secs = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .context("system clock before Unix epoch")?
      .as_secs();
    self.persist_at(chain, secs)
  }

  pub fn persist_at(&self, chain: &Chain, unix_secs: u64) -> Result<PathBuf> {
    let path = self.snapshot_path(unix_secs);
    chain.persist(&JsonSnapshot::new(&path))?;
    Ok(path)
  }

  /// Snapshot files in name order. A missing directory has no snapshots.
  pub fn list(&self) -> Result<Vec<PathBuf>> {
    if !self.root.exists() {
      return Ok(Vec::new());
    }
    let entries = fs::read_dir(&self.root)
      .with_context(|| format!("listing ledger directory {}", self.root.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
      let path = entry?.path();
      if path.is_file() && path.extension().is_some_and(|ext| ext == SNAPSHOT_EXTENSION) {
        paths.push(path);
      }
    }
    paths.sort();
    debug!(count = paths.len(), "listed snapshots");
    Ok(paths)
  }

  /// Parse every snapshot. Files are independent; no cross-file linkage.
  pub fn load_all(&self) -> Result<Vec<Snapshot>> {
    self
      .list()?
      .into_iter()
      .map(|path| {
        let blocks = read_snapshot(&path)?;
        Ok(Snapshot { path, blocks })
      })
      .collect()
  }
}
