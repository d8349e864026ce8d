//! Toolchain abstraction.
//!
//! A [`ToolChain`] turns compile and link environments into concrete tool
//! invocations. The [`ToolChainDriver`] runs those invocations, records
//! successful compilations in the compile cache and reports stage success
//! as a boolean.
//!
//! # Module Structure
//!
//! - [`driver`] - Bootstrapping, parallel compilation and linking
//! - [`process`] - Spawning tools and forwarding their output
//! - [`msvc`] - Visual C++ argument synthesis (Win32, Win64)
//! - [`gnu`] - GCC/Clang argument synthesis (Linux64)

pub mod driver;
pub mod gnu;
pub mod msvc;
pub mod process;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::environment::{CompileEnvironment, LinkEnvironment};
use crate::error::ConfigError;
use crate::platform::Platform;
use crate::project::SourceKind;

pub use driver::{CompileOutput, DriverSettings, LinkOutput, ToolChainDriver};
pub use gnu::GnuToolChain;
pub use msvc::MsvcToolChain;
pub use process::{ToolError, ToolStatus, run_tool};

/// A response file written just before the tool is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFile {
  pub path: PathBuf,
  pub lines: Vec<String>,
}

impl ResponseFile {
  pub fn contents(&self) -> String {
    let mut contents = self.lines.join("\n");
    contents.push('\n');
    contents
  }
}

/// A single external tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
  pub program: String,
  pub args: Vec<String>,
  pub response_file: Option<ResponseFile>,
}

impl ToolInvocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      response_file: None,
    }
  }

  pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(&mut self, args: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  /// Human-readable command line, used for debug logging.
  pub fn command_line(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .map(|part| {
        if part.contains(' ') {
          format!("\"{part}\"")
        } else {
          part.to_string()
        }
      })
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// What compiling one source file will run and produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileStep {
  pub invocation: ToolInvocation,
  pub object_file: PathBuf,
  pub debug_file: Option<PathBuf>,
}

/// Environment variables passed to every tool spawned by a driver.
///
/// Produced once by [`ToolChain::bootstrap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolEnvironment {
  pub vars: BTreeMap<String, String>,
}

/// A native toolchain: how to set up, compile and link for a platform.
pub trait ToolChain: Send + Sync {
  fn name(&self) -> &'static str;

  /// One-time toolchain discovery. Runs at most once per driver.
  fn bootstrap(&self, platform: Platform) -> Result<ToolEnvironment, ConfigError>;

  /// Adds the toolchain's platform-wide settings to fresh environments.
  fn set_up_global_environment(&self, compile: &mut CompileEnvironment, link: &mut LinkEnvironment);

  /// Rejects a kind of source this toolchain can't compile for `platform`.
  ///
  /// Checked for every listed source before any compiler runs.
  fn check_source_kind(&self, _kind: SourceKind, _platform: Platform) -> Result<(), ConfigError> {
    Ok(())
  }

  /// Rejects link settings this toolchain can't honor. Checked at configure time.
  fn check_link_environment(&self, _environment: &LinkEnvironment) -> Result<(), ConfigError> {
    Ok(())
  }

  fn compile_step(
    &self,
    environment: &CompileEnvironment,
    source: &Path,
    kind: SourceKind,
  ) -> Result<CompileStep, ConfigError>;

  fn link_step(&self, environment: &LinkEnvironment) -> Result<ToolInvocation, ConfigError>;
}

/// Select the toolchain that builds for `platform`.
pub fn toolchain_for(platform: Platform) -> Result<Arc<dyn ToolChain>, ConfigError> {
  match platform {
    Platform::Win32 | Platform::Win64 => Ok(Arc::new(MsvcToolChain::new())),
    Platform::Linux64 => Ok(Arc::new(GnuToolChain::from_env())),
    Platform::Unknown => Err(ConfigError::UnsupportedPlatform(platform)),
  }
}
