use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::platform::{Configuration, Platform};
use crate::util::hash::hash_bytes;

/// Settings every source file of a project is compiled with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileEnvironment {
  pub platform: Platform,
  pub configuration: Configuration,
  /// Directory receiving object and debug files. Created before compiling.
  pub output_directory: PathBuf,
  /// Directory of the project being compiled. Artifacts mirror a source's
  /// location below it.
  pub source_directory: PathBuf,
  /// Ordered include search paths; the first match wins.
  include_paths: Vec<PathBuf>,
  definitions: Vec<String>,
  pub create_debug_info: bool,
  /// Extra arguments appended verbatim to every compiler invocation.
  pub additional_arguments: Vec<String>,
}

impl Default for CompileEnvironment {
  fn default() -> Self {
    Self {
      platform: Platform::Unknown,
      configuration: Configuration::Unknown,
      output_directory: PathBuf::new(),
      source_directory: PathBuf::new(),
      include_paths: Vec::new(),
      definitions: Vec::new(),
      create_debug_info: true,
      additional_arguments: Vec::new(),
    }
  }
}

impl CompileEnvironment {
  pub fn new(platform: Platform, configuration: Configuration) -> Self {
    Self {
      platform,
      configuration,
      ..Self::default()
    }
  }

  /// Copy of this environment compiling the project in `source_directory`
  /// into `output_directory`.
  pub fn for_project(&self, output_directory: impl Into<PathBuf>, source_directory: impl Into<PathBuf>) -> Self {
    Self {
      output_directory: output_directory.into(),
      source_directory: source_directory.into(),
      ..self.clone()
    }
  }

  /// Artifact written when compiling `source`, e.g. `Math/Util.cpp.obj`.
  ///
  /// A source below `source_directory` keeps its relative directory under
  /// `output_directory`. Any other source gets a suffix derived from its
  /// full path. Either way two sources never share an artifact.
  pub fn artifact_path(&self, source: &Path, extension: &str) -> PathBuf {
    let file_name = source
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default();

    let relative_directory = if self.source_directory.as_os_str().is_empty() {
      None
    } else {
      source
        .strip_prefix(&self.source_directory)
        .ok()
        .and_then(Path::parent)
        .filter(|dir| dir.components().all(|c| matches!(c, Component::Normal(_))))
    };

    match relative_directory {
      Some(directory) => self
        .output_directory
        .join(directory)
        .join(format!("{file_name}.{extension}")),
      None => {
        let digest = hash_bytes(source.to_string_lossy().as_bytes());
        let short = &digest.as_str()[..8];
        self.output_directory.join(format!("{file_name}-{short}.{extension}"))
      }
    }
  }

  /// Append an include path unless it is already present.
  ///
  /// A duplicate keeps its original (earlier) search position.
  pub fn add_include_path(&mut self, path: impl Into<PathBuf>) {
    let path = path.into();
    if !self.include_paths.contains(&path) {
      self.include_paths.push(path);
    }
  }

  pub fn add_definition(&mut self, definition: impl Into<String>) {
    let definition = definition.into();
    if !self.definitions.contains(&definition) {
      self.definitions.push(definition);
    }
  }

  pub fn include_paths(&self) -> &[PathBuf] {
    &self.include_paths
  }

  pub fn definitions(&self) -> &[String] {
    &self.definitions
  }

  pub fn has_definition(&self, definition: &str) -> bool {
    self.definitions.iter().any(|d| d == definition)
  }

  pub fn includes(&self, path: &Path) -> bool {
    self.include_paths.iter().any(|p| p == path)
  }
}
