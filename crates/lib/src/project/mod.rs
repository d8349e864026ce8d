//! Projects: independently compilable units and the targets built from them.
//!
//! # Submodules
//!
//! - [`sources`] - Project files and source classification
//! - [`descriptor`] - Target descriptors contributing environments and project lists
//! - [`registry`] - Resolution of a project identifier to a target

pub mod descriptor;
pub mod registry;
pub mod sources;

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::environment::{CompileEnvironment, LinkEnvironment};
use crate::error::ConfigError;

pub use descriptor::{EnvironmentDelta, TargetDescriptor};
pub use registry::ProjectRegistry;
pub use sources::{JsonSourceLister, ProjectFile, SourceKind, SourceLister};

/// Identifies a compilable unit by the path of its project file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProjectDescriptor {
  pub path: PathBuf,
}

impl ProjectDescriptor {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Project name: the project file name without its extension.
  pub fn name(&self) -> String {
    self
      .path
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_else(|| self.path.display().to_string())
  }

  pub fn exists(&self) -> bool {
    self.path.is_file()
  }

  pub fn directory(&self) -> &Path {
    self.path.parent().unwrap_or_else(|| Path::new(""))
  }
}

/// Something that can be built: contributes its own environment deltas,
/// dependency projects, and primary projects to a build target.
pub trait Project: Send + Sync {
  fn name(&self) -> &str;

  /// Add this project's settings for the platform and configuration already
  /// recorded in `compile`.
  fn set_up_environment(
    &self,
    compile: &mut CompileEnvironment,
    link: &mut LinkEnvironment,
    dependencies: &mut Vec<ProjectDescriptor>,
    projects: &mut Vec<ProjectDescriptor>,
  ) -> Result<(), ConfigError>;
}

/// Errors reading project files and target descriptors.
#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("duplicate target name '{name}' in {}", path.display())]
  DuplicateTarget { name: String, path: PathBuf },
}
