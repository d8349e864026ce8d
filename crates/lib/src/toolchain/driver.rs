//! Runs toolchain invocations for a build.
//!
//! The driver owns the once-per-instance toolchain bootstrap, compiles the
//! files of one bucket concurrently, and registers every successful
//! compilation in the project's compile cache.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::process::{ToolError, ToolStatus, run_tool};
use super::{CompileStep, ToolChain, ToolEnvironment, toolchain_for};
use crate::cache::{CompileCache, CompileCacheItem};
use crate::environment::{CompileEnvironment, LinkEnvironment};
use crate::error::{BuildError, ConfigError};
use crate::platform::Platform;
use crate::project::SourceKind;
use crate::util::hash::{ContentHash, hash_file};

/// Execution limits for spawned tools.
#[derive(Debug, Clone)]
pub struct DriverSettings {
  /// Maximum number of compiler processes running at once.
  pub jobs: usize,
  /// Upper bound on a single tool run. `None` waits indefinitely.
  pub tool_timeout: Option<Duration>,
}

impl Default for DriverSettings {
  fn default() -> Self {
    Self {
      jobs: 1,
      tool_timeout: None,
    }
  }
}

/// Result of compiling one bucket of sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
  /// Objects for the files that compiled, in input order.
  pub object_files: Vec<PathBuf>,
  pub debug_files: Vec<PathBuf>,
  pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutput {
  pub output_file: PathBuf,
  pub success: bool,
}

pub struct ToolChainDriver {
  toolchain: Arc<dyn ToolChain>,
  platform: Platform,
  settings: DriverSettings,
  environment: OnceCell<ToolEnvironment>,
}

impl std::fmt::Debug for ToolChainDriver {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ToolChainDriver")
      .field("toolchain", &self.toolchain.name())
      .field("platform", &self.platform)
      .field("settings", &self.settings)
      .field("bootstrapped", &self.environment.initialized())
      .finish()
  }
}

struct PendingCompile {
  source: PathBuf,
  hash: ContentHash,
  step: CompileStep,
}

impl ToolChainDriver {
  pub fn new(toolchain: Arc<dyn ToolChain>, platform: Platform, settings: DriverSettings) -> Self {
    Self {
      toolchain,
      platform,
      settings,
      environment: OnceCell::new(),
    }
  }

  /// Driver for the toolchain that builds `platform`.
  pub fn for_platform(platform: Platform, settings: DriverSettings) -> Result<Self, ConfigError> {
    Ok(Self::new(toolchain_for(platform)?, platform, settings))
  }

  pub fn toolchain(&self) -> &Arc<dyn ToolChain> {
    &self.toolchain
  }

  pub fn platform(&self) -> Platform {
    self.platform
  }

  pub fn settings(&self) -> &DriverSettings {
    &self.settings
  }

  pub fn is_bootstrapped(&self) -> bool {
    self.environment.initialized()
  }

  /// Initialize the toolchain environment, at most once per driver.
  pub async fn bootstrap(&self) -> Result<&ToolEnvironment, ConfigError> {
    self
      .environment
      .get_or_try_init(|| async {
        info!(toolchain = self.toolchain.name(), platform = %self.platform, "initializing toolchain");
        self.toolchain.bootstrap(self.platform)
      })
      .await
  }

  /// Compile `files` of one kind and register each success in `cache`.
  ///
  /// Every file is attempted even after a failure, so that one pass
  /// surfaces all diagnostics. Failed files contribute no object and set
  /// `success` to false.
  pub async fn compile_sources(
    &self,
    environment: &CompileEnvironment,
    files: &[PathBuf],
    kind: SourceKind,
    cache: &mut CompileCache,
  ) -> Result<CompileOutput, BuildError> {
    let tool_environment = Arc::new(self.bootstrap().await?.clone());
    tokio::fs::create_dir_all(&environment.output_directory)
      .await
      .map_err(|e| BuildError::io(&environment.output_directory, e))?;

    // every command line is built before the first tool starts
    self.toolchain.check_source_kind(kind, environment.platform)?;
    let mut success = true;
    let mut pending = Vec::with_capacity(files.len());
    for source in files {
      let step = self.toolchain.compile_step(environment, source, kind)?;
      // the hash must describe the content that is about to be compiled
      let hash = match hash_file(source) {
        Ok(hash) => hash,
        Err(e) => {
          error!(source = %source.display(), error = %e, "cannot read source file");
          success = false;
          continue;
        }
      };
      pending.push(PendingCompile {
        source: source.clone(),
        hash,
        step,
      });
    }

    let mut directories = HashSet::new();
    for compile in &pending {
      let artifacts = std::iter::once(&compile.step.object_file).chain(compile.step.debug_file.as_ref());
      for directory in artifacts.filter_map(|artifact| artifact.parent()) {
        if directories.insert(directory.to_path_buf()) {
          tokio::fs::create_dir_all(directory)
            .await
            .map_err(|e| BuildError::io(directory, e))?;
        }
      }
    }

    let semaphore = Arc::new(Semaphore::new(self.settings.jobs.max(1)));
    let timeout = self.settings.tool_timeout;
    let mut join_set = JoinSet::new();
    for (index, compile) in pending.iter().enumerate() {
      let invocation = compile.step.invocation.clone();
      let tool_environment = tool_environment.clone();
      let semaphore = semaphore.clone();
      info!("{}", display_name(&compile.source));

      join_set.spawn(async move {
        let _permit = semaphore.acquire_owned().await.ok();
        (index, run_tool(&invocation, &tool_environment, timeout).await)
      });
    }

    let mut statuses: Vec<Option<Result<ToolStatus, ToolError>>> = pending.iter().map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
      match joined {
        Ok((index, result)) => statuses[index] = Some(result),
        Err(e) => error!(error = %e, "compile task panicked"),
      }
    }

    let mut output = CompileOutput::default();
    for (compile, status) in pending.into_iter().zip(statuses) {
      match status {
        Some(Ok(status)) if status.success() => {
          debug!(source = %compile.source.display(), object = %compile.step.object_file.display(), "compiled");
          cache.add_item(CompileCacheItem::new(
            &compile.source,
            &compile.step.object_file,
            compile.hash,
          ));
          output.object_files.push(compile.step.object_file);
          output.debug_files.extend(compile.step.debug_file);
        }
        Some(Ok(status)) => {
          error!(source = %compile.source.display(), code = ?status.code, "compilation failed");
          success = false;
        }
        Some(Err(e)) => {
          error!(source = %compile.source.display(), error = %e, "compiler did not run");
          success = false;
        }
        None => success = false,
      }
    }

    output.success = success;
    Ok(output)
  }

  /// Link every input of `environment` into its output file.
  pub async fn link_objects(&self, environment: &LinkEnvironment) -> Result<LinkOutput, BuildError> {
    let tool_environment = self.bootstrap().await?.clone();
    let invocation = self.toolchain.link_step(environment)?;

    let output_file = environment.output_file_path.clone();
    if let Some(parent) = output_file.parent().filter(|parent| !parent.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| BuildError::io(parent, e))?;
    }

    info!(output = %output_file.display(), inputs = environment.input_files().len(), "linking");
    let success = match run_tool(&invocation, &tool_environment, self.settings.tool_timeout).await {
      Ok(status) if status.success() => true,
      Ok(status) => {
        error!(output = %output_file.display(), code = ?status.code, "link failed");
        false
      }
      Err(e) => {
        error!(output = %output_file.display(), error = %e, "linker did not run");
        false
      }
    };

    Ok(LinkOutput { output_file, success })
  }
}

fn display_name(source: &Path) -> String {
  source
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| source.display().to_string())
}
