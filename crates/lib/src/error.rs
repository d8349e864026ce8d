//! Error types shared across the build pipeline.
//!
//! Configuration errors are expected, user-facing failures and carry a
//! single-line message. Everything else is an unexpected fault.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::platform::Platform;
use crate::project::ProjectError;
use crate::util::hash::HashError;

/// Errors caused by how a build was requested or configured.
///
/// These abort the pipeline before any compilation starts.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Couldn't find project name.")]
  MissingProject,

  #[error("Couldn't find platform name.")]
  MissingPlatform,

  #[error("Couldn't determine configuration name.")]
  MissingConfiguration,

  #[error("Expected path after {flag} argument, but found nothing.")]
  MissingArgumentValue { flag: String },

  #[error("Unknown project '{0}'.")]
  UnknownProject(String),

  #[error("Unexpected output extension: '{found}' instead of {expected}.")]
  UnsupportedOutputExtension { found: String, expected: String },

  #[error("Platform {0} is not supported by any toolchain.")]
  UnsupportedPlatform(Platform),

  #[error("The {toolchain} toolchain does not support {feature} on {platform}.")]
  UnsupportedFeature {
    toolchain: &'static str,
    feature: String,
    platform: Platform,
  },

  #[error("{0}")]
  ToolchainUnavailable(String),

  #[error("Invalid value for {name}: {message}")]
  InvalidSetting { name: String, message: String },
}

/// Errors that abort a build.
///
/// Toolchain failures (a compiler or linker exiting non-zero) are not
/// errors: they are reported through the boolean outcome of each stage.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("Project file \"{}\" doesn't exist.", path.display())]
  MissingProjectFile { path: PathBuf },

  #[error(transparent)]
  Project(#[from] ProjectError),

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("io error at {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("build target is {found}, expected {expected}")]
  InvalidState { expected: String, found: String },
}

impl BuildError {
  pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    BuildError::Io {
      path: path.into(),
      source,
    }
  }

  /// Whether the error is an expected, user-caused failure.
  ///
  /// User errors are reported as a single line; anything else is reported
  /// with its full diagnostic chain.
  pub fn is_user_error(&self) -> bool {
    matches!(
      self,
      BuildError::Config(_) | BuildError::MissingProjectFile { .. } | BuildError::Project(_)
    )
  }
}
