//! Persistent per-project compile cache.
//!
//! Maps each source file to the artifact it was last compiled into and the
//! content hash it had at that time. A source file may reuse its artifact
//! only when all three hold:
//!
//! 1. the cache has an item for the source path,
//! 2. the source's current content hash equals the recorded hash,
//! 3. the recorded artifact still exists on disk.
//!
//! Only the source file itself is hashed, so edits to included headers are
//! not detected.
//!
//! # Storage
//!
//! ```text
//! {intermediate}/{Platform}/{Configuration}/{Project}/
//! └── CompileCache-{Project}.json
//! ```
//!
//! A missing or unreadable cache file only costs incrementality: the cache
//! degrades to empty and every source is recompiled.

mod types;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::consts::COMPILE_CACHE_VERSION;
use crate::util::hash::ContentHash;

pub use types::{CacheError, CacheFile, CacheStatus, CompileCacheItem, MissReason};

/// In-memory view of one project's compile cache.
///
/// Holds at most one item per source path.
#[derive(Debug, Clone, Default)]
pub struct CompileCache {
  items: HashMap<PathBuf, CompileCacheItem>,
}

impl CompileCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load a cache from `path`, falling back to an empty cache on any error.
  ///
  /// Failures are logged; they never abort a build.
  pub fn open(path: &Path) -> Self {
    let mut cache = Self::new();
    if let Err(e) = cache.load(path) {
      warn!(path = %path.display(), error = %e, "compile cache unusable, rebuilding from scratch");
    }
    cache
  }

  /// Replace the contents of this cache with the file at `path`.
  ///
  /// A missing file yields an empty cache and is not an error. On failure
  /// the cache is left empty.
  pub fn load(&mut self, path: &Path) -> Result<(), CacheError> {
    self.clear();

    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no compile cache yet");
        return Ok(());
      }
      Err(e) => return Err(CacheError::Read(e)),
    };

    let file: CacheFile = serde_json::from_str(&content).map_err(CacheError::Parse)?;
    if file.version != COMPILE_CACHE_VERSION {
      return Err(CacheError::UnsupportedVersion(file.version));
    }

    for item in file.items {
      self.add_item(item);
    }

    debug!(path = %path.display(), items = self.len(), "loaded compile cache");
    Ok(())
  }

  /// Write every item to `path`, replacing the previous file.
  ///
  /// Uses atomic write (write to temp, then rename) so an interrupted save
  /// never leaves a truncated cache behind.
  pub fn save(&self, path: &Path) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(CacheError::Write)?;
    }

    let mut items: Vec<&CompileCacheItem> = self.items.values().collect();
    items.sort_by(|a, b| a.source_file.cmp(&b.source_file));

    let file = CacheFile {
      version: COMPILE_CACHE_VERSION,
      items: items.into_iter().cloned().collect(),
    };

    let content = serde_json::to_string_pretty(&file).map_err(CacheError::Serialize)?;
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    fs::write(&temp_path, content).map_err(CacheError::Write)?;
    fs::rename(&temp_path, path).map_err(CacheError::Write)?;

    debug!(path = %path.display(), items = self.len(), "saved compile cache");
    Ok(())
  }

  pub fn find_item(&self, source_file: &Path) -> Option<&CompileCacheItem> {
    self.items.get(source_file)
  }

  /// Insert `item`, replacing any item recorded for the same source path.
  pub fn add_item(&mut self, item: CompileCacheItem) {
    self.items.insert(item.source_file.clone(), item);
  }

  pub fn clear(&mut self) {
    self.items.clear();
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn items(&self) -> impl Iterator<Item = &CompileCacheItem> {
    self.items.values()
  }

  /// Drop items whose source is not in `sources`. Returns how many were dropped.
  pub fn retain_sources(&mut self, sources: &HashSet<&Path>) -> usize {
    let before = self.items.len();
    self.items.retain(|source, _| sources.contains(source.as_path()));
    before - self.items.len()
  }

  /// Decide whether `source_file`, currently hashing to `current_hash`, can
  /// reuse its recorded artifact.
  pub fn status(&self, source_file: &Path, current_hash: &ContentHash) -> CacheStatus {
    let Some(item) = self.find_item(source_file) else {
      return CacheStatus::Miss(MissReason::NotCached);
    };

    if item.hash != *current_hash {
      return CacheStatus::Miss(MissReason::SourceChanged);
    }

    if !item.compiled_file.exists() {
      return CacheStatus::Miss(MissReason::ArtifactMissing);
    }

    CacheStatus::Hit {
      compiled_file: item.compiled_file.clone(),
    }
  }
}
