//! Test utilities for anvil-lib.
//!
//! [`ScriptedToolChain`] stands in for a vendor compiler: it spawns real
//! child processes through the platform shell, copies sources to their
//! object paths and fails any source containing `COMPILE_ERROR`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::environment::{CompileEnvironment, LinkEnvironment};
use crate::error::ConfigError;
use crate::platform::Platform;
use crate::project::SourceKind;
use crate::toolchain::{CompileStep, ToolChain, ToolEnvironment, ToolInvocation};

/// Marker that makes the scripted compiler fail.
pub const COMPILE_ERROR: &str = "COMPILE_ERROR";

/// Returns the shell command and args to run a script with positional arguments.
#[cfg(unix)]
pub fn shell_script(script: &str, args: &[String]) -> ToolInvocation {
  let mut invocation = ToolInvocation::new("/bin/sh");
  invocation.args(["-c", script]).args(args.iter().cloned());
  invocation
}

#[cfg(windows)]
pub fn shell_script(script: &str, args: &[String]) -> ToolInvocation {
  let mut script = script.to_string();
  for (index, arg) in args.iter().enumerate() {
    script = script.replace(&format!("%{index}"), arg);
  }
  let mut invocation = ToolInvocation::new("cmd.exe");
  invocation.args(["/C", script.as_str()]);
  invocation
}

#[cfg(unix)]
const COMPILE_SCRIPT: &str =
  "if grep -q COMPILE_ERROR \"$0\"; then echo \"$0: error: forced failure\" >&2; exit 1; fi; basename \"$0\"; cp \"$0\" \"$1\"";

#[cfg(windows)]
const COMPILE_SCRIPT: &str = "findstr /C:COMPILE_ERROR \"%0\" >nul && exit /b 1 || copy /Y \"%0\" \"%1\" >nul";

#[cfg(unix)]
const LINK_SCRIPT: &str = "cat \"$@\" > \"$0\"";

#[cfg(windows)]
const LINK_SCRIPT: &str = "type nul > \"%0\"";

#[cfg(unix)]
const FAILING_LINK_SCRIPT: &str = "echo \"$0: fatal error: unresolved externals\" >&2; exit 1";

#[cfg(windows)]
const FAILING_LINK_SCRIPT: &str = "exit /b 1";

/// Toolchain that drives shell scripts and counts what it was asked to do.
#[derive(Debug, Default)]
pub struct ScriptedToolChain {
  pub bootstrap_calls: AtomicUsize,
  pub compile_calls: AtomicUsize,
  pub link_calls: AtomicUsize,
  compiled: Mutex<Vec<PathBuf>>,
  fail_link: bool,
  windows_features: bool,
}

impl ScriptedToolChain {
  pub fn new() -> Self {
    Self {
      windows_features: true,
      ..Self::default()
    }
  }

  pub fn failing_link() -> Self {
    Self {
      fail_link: true,
      ..Self::new()
    }
  }

  /// Rejects resource scripts and delay-loaded libraries, like a GNU toolchain.
  pub fn without_windows_features() -> Self {
    Self::default()
  }

  fn unsupported(&self, feature: &str, platform: Platform) -> ConfigError {
    ConfigError::UnsupportedFeature {
      toolchain: self.name(),
      feature: feature.to_string(),
      platform,
    }
  }

  /// Sources handed to the compiler, in request order.
  pub fn compiled_sources(&self) -> Vec<PathBuf> {
    self.compiled.lock().unwrap().clone()
  }

  pub fn compiled_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self
      .compiled_sources()
      .iter()
      .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
      .collect();
    names.sort();
    names
  }
}

impl ToolChain for ScriptedToolChain {
  fn name(&self) -> &'static str {
    "scripted"
  }

  fn bootstrap(&self, _platform: Platform) -> Result<ToolEnvironment, ConfigError> {
    self.bootstrap_calls.fetch_add(1, Ordering::SeqCst);
    let mut environment = ToolEnvironment::default();
    environment.vars.insert("ANVIL_SCRIPTED".to_string(), "1".to_string());
    Ok(environment)
  }

  fn set_up_global_environment(&self, compile: &mut CompileEnvironment, _link: &mut LinkEnvironment) {
    compile.add_definition("PLATFORM_SCRIPTED=1");
  }

  fn check_source_kind(&self, kind: SourceKind, platform: Platform) -> Result<(), ConfigError> {
    if kind == SourceKind::Resource && !self.windows_features {
      return Err(self.unsupported("resource scripts", platform));
    }
    Ok(())
  }

  fn check_link_environment(&self, environment: &LinkEnvironment) -> Result<(), ConfigError> {
    if !environment.delay_load_libraries.is_empty() && !self.windows_features {
      return Err(self.unsupported("delay-loaded libraries", environment.platform));
    }
    Ok(())
  }

  fn compile_step(
    &self,
    environment: &CompileEnvironment,
    source: &Path,
    kind: SourceKind,
  ) -> Result<CompileStep, ConfigError> {
    self.check_source_kind(kind, environment.platform)?;
    self.compile_calls.fetch_add(1, Ordering::SeqCst);
    self.compiled.lock().unwrap().push(source.to_path_buf());

    let object_file = environment.artifact_path(source, "o");
    let invocation = shell_script(
      COMPILE_SCRIPT,
      &[source.display().to_string(), object_file.display().to_string()],
    );
    Ok(CompileStep {
      invocation,
      object_file,
      debug_file: None,
    })
  }

  fn link_step(&self, environment: &LinkEnvironment) -> Result<ToolInvocation, ConfigError> {
    self.link_calls.fetch_add(1, Ordering::SeqCst);
    let script = if self.fail_link { FAILING_LINK_SCRIPT } else { LINK_SCRIPT };
    let args: Vec<String> = std::iter::once(environment.output_file_path.display().to_string())
      .chain(environment.input_files().iter().map(|input| input.display().to_string()))
      .collect();
    Ok(shell_script(script, &args))
  }
}

/// Write `contents` to `dir/name`, creating parent directories.
pub fn write_source(dir: &Path, name: &str, contents: &str) -> PathBuf {
  let path = dir.join(name);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(&path, contents).unwrap();
  path
}

/// Write a project file listing `sources` and return its path.
pub fn write_project(dir: &Path, name: &str, sources: &[&str]) -> PathBuf {
  let contents = serde_json::json!({ "sources": sources }).to_string();
  write_source(dir, &format!("{name}/{name}.json"), &contents)
}
