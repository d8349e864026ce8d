//! Resolution of project identifiers to buildable targets.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::{Project, ProjectError, TargetDescriptor};
use crate::consts::TARGETS_DIR;

/// Buildable targets keyed by case-insensitive name.
#[derive(Default, Clone)]
pub struct ProjectRegistry {
  projects: BTreeMap<String, Arc<dyn Project>>,
}

impl std::fmt::Debug for ProjectRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProjectRegistry").field("projects", &self.names()).finish()
  }
}

impl ProjectRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load every target descriptor in `<root>/targets/`.
  ///
  /// A missing directory yields an empty registry.
  pub fn load_dir(root: &Path) -> Result<Self, ProjectError> {
    let dir = root.join(TARGETS_DIR);
    let mut registry = Self::new();

    let entries = match fs::read_dir(&dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(registry),
      Err(source) => return Err(ProjectError::Read { path: dir, source }),
    };

    let mut paths = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|source| ProjectError::Read {
        path: dir.clone(),
        source,
      })?;
      let path = entry.path();
      if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
        paths.push(path);
      }
    }
    paths.sort();

    for path in paths {
      let descriptor = TargetDescriptor::load(&path, root)?;
      debug!(target_name = %descriptor.name, path = %path.display(), "registered target");
      let name = descriptor.name.clone();
      if registry.register(Arc::new(descriptor)).is_some() {
        return Err(ProjectError::DuplicateTarget { name, path });
      }
    }

    Ok(registry)
  }

  /// Register a project, returning the project it replaced, if any.
  pub fn register(&mut self, project: Arc<dyn Project>) -> Option<Arc<dyn Project>> {
    self.projects.insert(project.name().to_ascii_lowercase(), project)
  }

  pub fn resolve(&self, name: &str) -> Option<Arc<dyn Project>> {
    self.projects.get(&name.to_ascii_lowercase()).cloned()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.projects.contains_key(&name.to_ascii_lowercase())
  }

  /// Registered names, in their declared spelling.
  pub fn names(&self) -> Vec<&str> {
    self.projects.values().map(|project| project.name()).collect()
  }

  pub fn is_empty(&self) -> bool {
    self.projects.is_empty()
  }
}
