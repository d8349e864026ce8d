use std::fmt;

use serde::Serialize;

/// Build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Configuration {
  #[default]
  Unknown,
  Debug,
  Release,
  /// Fully optimized build used for final releases.
  Shipping,
}

impl Configuration {
  pub const SUPPORTED: [Configuration; 3] = [Configuration::Debug, Configuration::Release, Configuration::Shipping];

  /// Parse a configuration identifier, case-insensitively.
  pub fn from_name(name: &str) -> Option<Self> {
    Self::SUPPORTED
      .into_iter()
      .find(|configuration| configuration.as_str().eq_ignore_ascii_case(name))
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Unknown => "Unknown",
      Self::Debug => "Debug",
      Self::Release => "Release",
      Self::Shipping => "Shipping",
    }
  }

  /// Preprocessor definition every source of this configuration is compiled with.
  pub fn definition(&self) -> Option<&'static str> {
    match self {
      Self::Debug => Some("DEBUG=1"),
      Self::Release => Some("RELEASE=1"),
      Self::Shipping => Some("SHIPPING=1"),
      Self::Unknown => None,
    }
  }
}

impl fmt::Display for Configuration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
