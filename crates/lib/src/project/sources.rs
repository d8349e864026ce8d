//! Project files and source classification.
//!
//! A project file is a JSON document listing the project's sources,
//! relative to the project file's directory:
//!
//! ```json
//! { "sources": ["Source/Main.cpp", "Source/zlib/inflate.c", "Resources/Game.rc"] }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ProjectDescriptor, ProjectError};

/// Category of a source file, deciding how it is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
  Cpp,
  C,
  Resource,
}

impl SourceKind {
  /// Compilation order of the buckets within one project.
  pub const ORDER: [SourceKind; 3] = [SourceKind::Cpp, SourceKind::C, SourceKind::Resource];

  /// Classify a path by its extension. Unrecognized files yield `None`.
  pub fn classify(path: &Path) -> Option<Self> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
      "cpp" | "cxx" | "cc" => Some(Self::Cpp),
      "c" => Some(Self::C),
      "rc" => Some(Self::Resource),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Cpp => "C++",
      Self::C => "C",
      Self::Resource => "resource",
    }
  }
}

impl std::fmt::Display for SourceKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Lists the source files belonging to a project, in project order.
pub trait SourceLister: Send + Sync {
  fn project_sources(&self, project: &ProjectDescriptor) -> Result<Vec<PathBuf>, ProjectError>;
}

/// Contents of a JSON project file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectFile {
  #[serde(default)]
  pub sources: Vec<PathBuf>,
}

impl ProjectFile {
  pub fn load(path: &Path) -> Result<Self, ProjectError> {
    let content = fs::read_to_string(path).map_err(|source| ProjectError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ProjectError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }
}

/// Default [`SourceLister`]: reads JSON project files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSourceLister;

impl SourceLister for JsonSourceLister {
  fn project_sources(&self, project: &ProjectDescriptor) -> Result<Vec<PathBuf>, ProjectError> {
    let file = ProjectFile::load(&project.path)?;
    let directory = project.directory();
    Ok(file.sources.into_iter().map(|source| directory.join(source)).collect())
  }
}
