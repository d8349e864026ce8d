use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::hash::ContentHash;

/// One cached compilation: a source file, its artifact, and the source hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileCacheItem {
  pub source_file: PathBuf,
  pub compiled_file: PathBuf,
  pub hash: ContentHash,
}

impl CompileCacheItem {
  pub fn new(source_file: impl AsRef<Path>, compiled_file: impl AsRef<Path>, hash: ContentHash) -> Self {
    Self {
      source_file: source_file.as_ref().to_path_buf(),
      compiled_file: compiled_file.as_ref().to_path_buf(),
      hash,
    }
  }
}

/// On-disk representation of a compile cache.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheFile {
  pub version: u32,
  pub items: Vec<CompileCacheItem>,
}

/// Outcome of the cache validity check for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
  /// The recorded artifact can be linked as-is.
  Hit { compiled_file: PathBuf },
  Miss(MissReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
  NotCached,
  SourceChanged,
  ArtifactMissing,
}

impl std::fmt::Display for MissReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let reason = match self {
      MissReason::NotCached => "not cached",
      MissReason::SourceChanged => "source changed",
      MissReason::ArtifactMissing => "artifact missing",
    };
    f.write_str(reason)
  }
}

/// Errors reading or writing a compile cache file.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("failed to read compile cache: {0}")]
  Read(#[source] io::Error),

  #[error("failed to parse compile cache: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("unsupported compile cache version: {0}")]
  UnsupportedVersion(u32),

  #[error("failed to serialize compile cache: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write compile cache: {0}")]
  Write(#[source] io::Error),
}
