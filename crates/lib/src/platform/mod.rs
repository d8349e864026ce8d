//! Target platform and build configuration identifiers.
//!
//! Both are parsed once per build invocation and never change afterwards.

pub mod configuration;

use std::fmt;

use serde::Serialize;

pub use configuration::Configuration;

/// Platform family, used where behavior is shared between platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformFamily {
  Windows,
  Unix,
  Unknown,
}

/// Target platform of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Platform {
  #[default]
  Unknown,
  Win32,
  Win64,
  Linux64,
}

impl Platform {
  /// Every platform a build can target.
  pub const SUPPORTED: [Platform; 3] = [Platform::Win32, Platform::Win64, Platform::Linux64];

  /// Parse a platform identifier, case-insensitively.
  ///
  /// Returns `None` for anything that isn't a known platform name.
  pub fn from_name(name: &str) -> Option<Self> {
    Self::SUPPORTED
      .into_iter()
      .find(|platform| platform.as_str().eq_ignore_ascii_case(name))
  }

  /// Detect the platform of the running host.
  ///
  /// Returns `None` if the host is not a supported build target.
  pub fn host() -> Option<Self> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
      ("windows", "x86_64") => Some(Self::Win64),
      ("windows", "x86") => Some(Self::Win32),
      ("linux", "x86_64") => Some(Self::Linux64),
      _ => None,
    }
  }

  /// Returns the identifier used in paths and output names (e.g. `Win64`).
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Unknown => "Unknown",
      Self::Win32 => "Win32",
      Self::Win64 => "Win64",
      Self::Linux64 => "Linux64",
    }
  }

  pub fn family(&self) -> PlatformFamily {
    match self {
      Self::Win32 | Self::Win64 => PlatformFamily::Windows,
      Self::Linux64 => PlatformFamily::Unix,
      Self::Unknown => PlatformFamily::Unknown,
    }
  }

  pub fn is_windows(&self) -> bool {
    self.family() == PlatformFamily::Windows
  }

  pub fn is_64_bit(&self) -> bool {
    matches!(self, Self::Win64 | Self::Linux64)
  }

  /// Output file extensions (lowercase, without the dot) the platform can link.
  ///
  /// An empty string stands for a file without extension.
  pub fn output_extensions(&self) -> &'static [&'static str] {
    match self {
      Self::Win32 | Self::Win64 => &["exe", "dll"],
      Self::Linux64 => &["", "so"],
      Self::Unknown => &[],
    }
  }

  /// Extension (with the dot) of a default executable, or `None` if the
  /// platform has no output format.
  pub fn executable_extension(&self) -> Option<&'static str> {
    match self {
      Self::Win32 | Self::Win64 => Some(".exe"),
      Self::Linux64 => Some(""),
      Self::Unknown => None,
    }
  }

  /// Check whether `extension` (lowercase or not, without the dot) is linkable.
  pub fn accepts_output_extension(&self, extension: &str) -> bool {
    self
      .output_extensions()
      .iter()
      .any(|accepted| accepted.eq_ignore_ascii_case(extension))
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_name_is_case_insensitive() {
    assert_eq!(Platform::from_name("WIN64"), Some(Platform::Win64));
    assert_eq!(Platform::from_name("win32"), Some(Platform::Win32));
    assert_eq!(Platform::from_name("linux64"), Some(Platform::Linux64));
    assert_eq!(Platform::from_name("unknown"), None);
    assert_eq!(Platform::from_name("amiga"), None);
  }

  #[test]
  fn windows_family_links_exe_and_dll() {
    assert!(Platform::Win64.accepts_output_extension("EXE"));
    assert!(Platform::Win32.accepts_output_extension("dll"));
    assert!(!Platform::Win64.accepts_output_extension("so"));
    assert!(!Platform::Win64.accepts_output_extension(""));
  }

  #[test]
  fn linux_links_executables_and_shared_objects() {
    assert!(Platform::Linux64.accepts_output_extension(""));
    assert!(Platform::Linux64.accepts_output_extension("so"));
    assert!(!Platform::Linux64.accepts_output_extension("exe"));
  }

  #[test]
  fn unknown_platform_has_no_outputs() {
    assert!(Platform::Unknown.output_extensions().is_empty());
    assert_eq!(Platform::Unknown.executable_extension(), None);
    assert_eq!(Platform::Unknown.family(), PlatformFamily::Unknown);
  }
}
