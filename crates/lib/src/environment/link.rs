use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::platform::{Configuration, Platform};

/// Settings for the single link step of a build target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkEnvironment {
  pub platform: Platform,
  pub configuration: Configuration,
  pub output_file_path: PathBuf,
  /// Where non-executable outputs (PDB, import library, map) are written.
  pub output_directory: PathBuf,
  /// Scratch directory for response files and per-project objects.
  pub intermediate_directory: PathBuf,
  pub library_paths: Vec<PathBuf>,
  pub excluded_libraries: Vec<String>,
  pub delay_load_libraries: Vec<String>,
  pub additional_libraries: Vec<String>,
  pub additional_arguments: Vec<String>,
  pub is_shipping_binary: bool,
  pub create_debug_info: bool,
  /// Object files accumulated across every compiled project. Only grows.
  input_files: Vec<PathBuf>,
}

impl LinkEnvironment {
  pub fn new(platform: Platform, configuration: Configuration) -> Self {
    Self {
      platform,
      configuration,
      ..Self::default()
    }
  }

  pub fn add_input_file(&mut self, path: impl Into<PathBuf>) {
    self.input_files.push(path.into());
  }

  pub fn extend_input_files(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
    self.input_files.extend(paths);
  }

  pub fn input_files(&self) -> &[PathBuf] {
    &self.input_files
  }

  pub fn add_library_path(&mut self, path: impl Into<PathBuf>) {
    let path = path.into();
    if !self.library_paths.contains(&path) {
      self.library_paths.push(path);
    }
  }

  pub fn add_library(&mut self, library: impl Into<String>) {
    push_unique(&mut self.additional_libraries, library.into());
  }

  pub fn add_excluded_library(&mut self, library: impl Into<String>) {
    push_unique(&mut self.excluded_libraries, library.into());
  }

  pub fn add_delay_load_library(&mut self, library: impl Into<String>) {
    push_unique(&mut self.delay_load_libraries, library.into());
  }

  /// Lowercase extension of the output file, empty if it has none.
  pub fn output_extension(&self) -> String {
    output_extension(&self.output_file_path)
  }
}

/// Lowercase extension of `path`, empty if it has none.
pub(crate) fn output_extension(path: &Path) -> String {
  path
    .extension()
    .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    .unwrap_or_default()
}

fn push_unique(list: &mut Vec<String>, value: String) {
  if !list.contains(&value) {
    list.push(value);
  }
}
