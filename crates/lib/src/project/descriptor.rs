//! Target descriptors.
//!
//! A target is described by a JSON file in `<root>/targets/`. Every path
//! in it is relative to the root:
//!
//! ```json
//! {
//!   "name": "TestbedGame",
//!   "dependencies": ["Engine/Core/Core.json"],
//!   "projects": ["Games/Testbed/Testbed.json"],
//!   "include_paths": ["Engine/Core/Include"],
//!   "platforms": {
//!     "win64": { "libraries": ["d3d11.lib"], "library_paths": ["External/SDL2/lib/Win64"] }
//!   },
//!   "configurations": {
//!     "debug": { "definitions": ["WITH_EDITOR=1"] },
//!     "release": { "definitions": ["WITH_EDITOR=1"] }
//!   }
//! }
//! ```
//!
//! Common settings apply first, then the platform section, then the
//! configuration section.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Project, ProjectDescriptor, ProjectError};
use crate::environment::{CompileEnvironment, LinkEnvironment};
use crate::error::ConfigError;

/// Settings a target adds to the build environments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentDelta {
  pub dependencies: Vec<PathBuf>,
  pub projects: Vec<PathBuf>,
  pub include_paths: Vec<PathBuf>,
  pub definitions: Vec<String>,
  pub library_paths: Vec<PathBuf>,
  pub libraries: Vec<String>,
  pub excluded_libraries: Vec<String>,
  pub delay_load_libraries: Vec<String>,
}

impl EnvironmentDelta {
  fn apply(
    &self,
    root: &Path,
    compile: &mut CompileEnvironment,
    link: &mut LinkEnvironment,
    dependencies: &mut Vec<ProjectDescriptor>,
    projects: &mut Vec<ProjectDescriptor>,
  ) {
    push_projects(root, &self.dependencies, dependencies);
    push_projects(root, &self.projects, projects);

    for path in &self.include_paths {
      compile.add_include_path(root.join(path));
    }
    for definition in &self.definitions {
      compile.add_definition(definition.clone());
    }
    for path in &self.library_paths {
      link.add_library_path(root.join(path));
    }
    for library in &self.libraries {
      link.add_library(library.clone());
    }
    for library in &self.excluded_libraries {
      link.add_excluded_library(library.clone());
    }
    for library in &self.delay_load_libraries {
      link.add_delay_load_library(library.clone());
    }
  }
}

fn push_projects(root: &Path, paths: &[PathBuf], list: &mut Vec<ProjectDescriptor>) {
  for path in paths {
    let desc = ProjectDescriptor::new(root.join(path));
    if !list.contains(&desc) {
      list.push(desc);
    }
  }
}

/// A buildable target loaded from a descriptor file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDescriptor {
  pub name: String,
  #[serde(flatten)]
  pub common: EnvironmentDelta,
  #[serde(default)]
  pub platforms: BTreeMap<String, EnvironmentDelta>,
  #[serde(default)]
  pub configurations: BTreeMap<String, EnvironmentDelta>,
  /// Directory every relative path is resolved against.
  #[serde(skip)]
  pub root: PathBuf,
}

impl TargetDescriptor {
  pub fn load(path: &Path, root: &Path) -> Result<Self, ProjectError> {
    let content = fs::read_to_string(path).map_err(|source| ProjectError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut descriptor: TargetDescriptor = serde_json::from_str(&content).map_err(|source| ProjectError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    descriptor.root = root.to_path_buf();
    Ok(descriptor)
  }

  fn section<'a>(sections: &'a BTreeMap<String, EnvironmentDelta>, key: &str) -> Option<&'a EnvironmentDelta> {
    sections
      .iter()
      .find(|(name, _)| name.eq_ignore_ascii_case(key))
      .map(|(_, delta)| delta)
  }
}

impl Project for TargetDescriptor {
  fn name(&self) -> &str {
    &self.name
  }

  fn set_up_environment(
    &self,
    compile: &mut CompileEnvironment,
    link: &mut LinkEnvironment,
    dependencies: &mut Vec<ProjectDescriptor>,
    projects: &mut Vec<ProjectDescriptor>,
  ) -> Result<(), ConfigError> {
    self.common.apply(&self.root, compile, link, dependencies, projects);

    if let Some(delta) = Self::section(&self.platforms, compile.platform.as_str()) {
      debug!(target_name = %self.name, platform = %compile.platform, "applying platform settings");
      delta.apply(&self.root, compile, link, dependencies, projects);
    }

    if let Some(delta) = Self::section(&self.configurations, compile.configuration.as_str()) {
      debug!(target_name = %self.name, configuration = %compile.configuration, "applying configuration settings");
      delta.apply(&self.root, compile, link, dependencies, projects);
    }

    Ok(())
  }
}
