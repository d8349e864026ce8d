//! Build target pipeline.
//!
//! A [`BuildTarget`] builds one target for one platform and configuration.
//! It moves through its states strictly in order and never re-enters one:
//!
//! ```text
//! Unconfigured -> EnvironmentConfigured -> DependenciesCompiled
//!              -> ProjectsCompiled -> Linked -> Success
//! ```
//!
//! Any failing stage moves the target to `Failed`. Configuration errors are
//! returned as `Err`; compiler and linker failures end in a `Failed`
//! [`BuildOutcome`].

mod request;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tracing::{debug, error, info};

use crate::compile::{CompileSummary, ProjectCompiler};
use crate::config::BuildOptions;
use crate::environment::{CompileEnvironment, LinkEnvironment, should_create_debug_info};
use crate::error::{BuildError, ConfigError};
use crate::platform::{Configuration, Platform};
use crate::project::{JsonSourceLister, Project, ProjectDescriptor, ProjectRegistry, SourceLister};
use crate::toolchain::ToolChainDriver;

pub use request::BuildRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuildState {
  Unconfigured,
  EnvironmentConfigured,
  DependenciesCompiled,
  ProjectsCompiled,
  Linked,
  Success,
  Failed,
}

impl BuildState {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Unconfigured => "unconfigured",
      Self::EnvironmentConfigured => "environment configured",
      Self::DependenciesCompiled => "dependencies compiled",
      Self::ProjectsCompiled => "projects compiled",
      Self::Linked => "linked",
      Self::Success => "success",
      Self::Failed => "failed",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Success | Self::Failed)
  }
}

impl std::fmt::Display for BuildState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Summary of a finished build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
  pub target: String,
  pub platform: Platform,
  pub configuration: Configuration,
  pub state: BuildState,
  pub success: bool,
  pub output_path: PathBuf,
  #[serde(flatten)]
  pub summary: CompileSummary,
  #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
  pub elapsed: Duration,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_f64(duration.as_secs_f64())
}

pub struct BuildTarget {
  request: BuildRequest,
  project: Arc<dyn Project>,
  options: BuildOptions,
  driver: Arc<ToolChainDriver>,
  sources: Arc<dyn SourceLister>,
  state: BuildState,
  compile: CompileEnvironment,
  link: LinkEnvironment,
  dependencies: Vec<ProjectDescriptor>,
  projects: Vec<ProjectDescriptor>,
  output_path: PathBuf,
  summary: CompileSummary,
}

impl std::fmt::Debug for BuildTarget {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BuildTarget")
      .field("project", &self.project.name())
      .field("request", &self.request)
      .field("state", &self.state)
      .field("output_path", &self.output_path)
      .finish_non_exhaustive()
  }
}

impl BuildTarget {
  /// Create a target for `project` using the toolchain of the requested platform.
  pub fn new(request: BuildRequest, project: Arc<dyn Project>, options: BuildOptions) -> Result<Self, BuildError> {
    if request.platform == Platform::Unknown {
      return Err(ConfigError::MissingPlatform.into());
    }
    if request.configuration == Configuration::Unknown {
      return Err(ConfigError::MissingConfiguration.into());
    }

    let driver = ToolChainDriver::for_platform(request.platform, options.driver_settings())?;
    Ok(Self {
      compile: CompileEnvironment::new(request.platform, request.configuration),
      link: LinkEnvironment::new(request.platform, request.configuration),
      request,
      project,
      options,
      driver: Arc::new(driver),
      sources: Arc::new(JsonSourceLister),
      state: BuildState::Unconfigured,
      dependencies: Vec::new(),
      projects: Vec::new(),
      output_path: PathBuf::new(),
      summary: CompileSummary::default(),
    })
  }

  /// Resolve the requested target in `registry` and create it.
  pub fn from_request(
    request: BuildRequest,
    registry: &ProjectRegistry,
    options: BuildOptions,
  ) -> Result<Self, BuildError> {
    let project = registry
      .resolve(&request.project)
      .ok_or_else(|| ConfigError::UnknownProject(request.project.clone()))?;
    Self::new(request, project, options)
  }

  /// Use a shared driver, so that several targets bootstrap the toolchain once.
  pub fn with_driver(mut self, driver: Arc<ToolChainDriver>) -> Self {
    self.driver = driver;
    self
  }

  pub fn with_source_lister(mut self, sources: Arc<dyn SourceLister>) -> Self {
    self.sources = sources;
    self
  }

  pub fn state(&self) -> BuildState {
    self.state
  }

  pub fn driver(&self) -> &Arc<ToolChainDriver> {
    &self.driver
  }

  /// Output file; empty until the target is configured.
  pub fn output_path(&self) -> &Path {
    &self.output_path
  }

  pub fn compile_environment(&self) -> &CompileEnvironment {
    &self.compile
  }

  pub fn link_environment(&self) -> &LinkEnvironment {
    &self.link
  }

  pub fn dependency_projects(&self) -> &[ProjectDescriptor] {
    &self.dependencies
  }

  pub fn projects(&self) -> &[ProjectDescriptor] {
    &self.projects
  }

  /// Set up the environments, directories and project lists.
  pub async fn configure(&mut self) -> Result<(), BuildError> {
    self.expect_state(BuildState::Unconfigured)?;
    let result = self.configure_environment().await;
    self.settle(result)
  }

  /// Run every remaining stage, configuring first if needed.
  pub async fn build(&mut self) -> Result<BuildOutcome, BuildError> {
    let started = Instant::now();
    info!(
      "Building {} - {} - {}",
      self.project.name(),
      self.request.platform,
      self.request.configuration
    );

    if self.state == BuildState::Unconfigured {
      self.configure().await?;
    }
    self.expect_state(BuildState::EnvironmentConfigured)?;

    let result = self.run_stages().await;
    self.settle(result)?;

    let outcome = self.outcome(started.elapsed());
    if outcome.success {
      info!(output = %outcome.output_path.display(), "build succeeded");
    } else {
      error!(target_name = %outcome.target, "build failed");
    }
    Ok(outcome)
  }

  fn outcome(&self, elapsed: Duration) -> BuildOutcome {
    BuildOutcome {
      target: self.project.name().to_string(),
      platform: self.request.platform,
      configuration: self.request.configuration,
      state: self.state,
      success: self.state == BuildState::Success,
      output_path: self.output_path.clone(),
      summary: self.summary.clone(),
      elapsed,
    }
  }

  fn expect_state(&self, expected: BuildState) -> Result<(), BuildError> {
    if self.state == expected {
      Ok(())
    } else {
      Err(BuildError::InvalidState {
        expected: expected.to_string(),
        found: self.state.to_string(),
      })
    }
  }

  fn settle<T>(&mut self, result: Result<T, BuildError>) -> Result<T, BuildError> {
    if result.is_err() {
      self.state = BuildState::Failed;
    }
    result
  }

  async fn configure_environment(&mut self) -> Result<(), BuildError> {
    let platform = self.request.platform;
    let configuration = self.request.configuration;

    let output_path = self.resolve_output_path()?;
    validate_output_extension(platform, &output_path)?;
    let output_directory = output_path.parent().map(Path::to_path_buf).unwrap_or_default();
    tokio::fs::create_dir_all(&output_directory)
      .await
      .map_err(|e| BuildError::io(&output_directory, e))?;

    let intermediate_directory = self
      .options
      .intermediate_dir
      .join(platform.as_str())
      .join(configuration.as_str());
    tokio::fs::create_dir_all(&intermediate_directory)
      .await
      .map_err(|e| BuildError::io(&intermediate_directory, e))?;

    let mut compile = CompileEnvironment::new(platform, configuration);
    let mut link = LinkEnvironment::new(platform, configuration);
    link.intermediate_directory = intermediate_directory;
    link.output_directory = output_directory;
    link.output_file_path = output_path.clone();

    // platform
    self.driver.bootstrap().await?;
    self.driver.toolchain().set_up_global_environment(&mut compile, &mut link);

    // configuration
    if let Some(definition) = configuration.definition() {
      compile.add_definition(definition);
    }
    compile.create_debug_info = should_create_debug_info(platform, configuration);
    link.create_debug_info = compile.create_debug_info;
    link.is_shipping_binary = configuration == Configuration::Shipping;

    // target
    let mut dependencies = Vec::new();
    let mut projects = Vec::new();
    self
      .project
      .set_up_environment(&mut compile, &mut link, &mut dependencies, &mut projects)?;

    // a project listed as a dependency is compiled and linked once
    let listed = projects.len();
    projects.retain(|project| !dependencies.contains(project));
    if projects.len() < listed {
      debug!(dropped = listed - projects.len(), "projects already listed as dependencies");
    }

    // unsupported features abort here, before any compiler runs
    self.driver.toolchain().check_link_environment(&link)?;
    let compiler = ProjectCompiler::new(&self.driver, self.sources.as_ref());
    compiler.check_projects(&compile, &dependencies)?;
    compiler.check_projects(&compile, &projects)?;

    self.compile = compile;
    self.link = link;
    self.dependencies = dependencies;
    self.projects = projects;
    self.output_path = output_path;
    self.state = BuildState::EnvironmentConfigured;
    info!(
      dependencies = self.dependencies.len(),
      projects = self.projects.len(),
      output = %self.output_path.display(),
      "environment configured"
    );
    Ok(())
  }

  async fn run_stages(&mut self) -> Result<(), BuildError> {
    let compiler = ProjectCompiler::new(&self.driver, self.sources.as_ref()).with_force_rebuild(self.options.force_rebuild);

    let dependencies = compiler
      .compile_projects(&self.compile, &mut self.link, &self.dependencies)
      .await?;
    self.summary.merge(&dependencies.summary);
    if !dependencies.success {
      self.state = BuildState::Failed;
      return Ok(());
    }
    self.state = BuildState::DependenciesCompiled;

    let projects = compiler
      .compile_projects(&self.compile, &mut self.link, &self.projects)
      .await?;
    self.summary.merge(&projects.summary);
    if !projects.success {
      self.state = BuildState::Failed;
      return Ok(());
    }
    self.state = BuildState::ProjectsCompiled;

    info!("Linking {}", self.project.name());
    validate_output_extension(self.request.platform, &self.output_path)?;
    let linked = self.driver.link_objects(&self.link).await?;
    if !linked.success {
      self.state = BuildState::Failed;
      return Ok(());
    }
    self.state = BuildState::Linked;
    self.state = BuildState::Success;
    Ok(())
  }

  /// The requested output path, or the default one:
  /// `<binaries>/<Platform>/<Name>-<Platform>-<Configuration><ext>`, or
  /// `<binaries>/<Platform>/<Name><ext>` for Shipping.
  fn resolve_output_path(&self) -> Result<PathBuf, BuildError> {
    let platform = self.request.platform;
    let path = match &self.request.output_path {
      Some(path) => path.clone(),
      None => {
        let extension = platform
          .executable_extension()
          .ok_or(ConfigError::UnsupportedPlatform(platform))?;
        let name = self.project.name();
        let file_name = if self.request.configuration == Configuration::Shipping {
          format!("{name}{extension}")
        } else {
          format!("{name}-{platform}-{}{extension}", self.request.configuration)
        };
        self.options.binaries_dir.join(platform.as_str()).join(file_name)
      }
    };
    std::path::absolute(&path).map_err(|e| BuildError::io(&path, e))
  }
}

fn validate_output_extension(platform: Platform, output_path: &Path) -> Result<(), ConfigError> {
  let extension = output_path
    .extension()
    .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    .unwrap_or_default();
  if platform.accepts_output_extension(&extension) {
    return Ok(());
  }

  let describe = |ext: &str| {
    if ext.is_empty() {
      "no extension".to_string()
    } else {
      format!(".{ext}")
    }
  };
  Err(ConfigError::UnsupportedOutputExtension {
    found: describe(&extension),
    expected: platform
      .output_extensions()
      .iter()
      .map(|ext| describe(ext))
      .collect::<Vec<_>>()
      .join(" or "),
  })
}
