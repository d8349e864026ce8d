//! Incremental compilation of project lists.
//!
//! [`ProjectCompiler`] walks a list of projects in order. For each project
//! it loads the compile cache, reuses artifacts whose sources are
//! unchanged, hands the rest to the toolchain driver bucket by bucket
//! (C++, then C, then resources) and saves the cache again.
//!
//! The first failing bucket stops the whole list: later projects are never
//! attempted.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStatus, CompileCache};
use crate::consts::COMPILE_CACHE_PREFIX;
use crate::environment::{CompileEnvironment, LinkEnvironment};
use crate::error::BuildError;
use crate::project::{ProjectDescriptor, SourceKind, SourceLister};
use crate::toolchain::ToolChainDriver;
use crate::util::hash::hash_file;

/// Counters for one or more compiled project lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompileSummary {
  /// Projects that invoked the compiler.
  pub projects_compiled: usize,
  /// Projects that had nothing to compile.
  pub projects_up_to_date: usize,
  /// Source files compiled successfully.
  pub files_compiled: usize,
  /// Source files whose cached artifact was reused.
  pub files_cached: usize,
}

impl CompileSummary {
  pub fn merge(&mut self, other: &CompileSummary) {
    self.projects_compiled += other.projects_compiled;
    self.projects_up_to_date += other.projects_up_to_date;
    self.files_compiled += other.files_compiled;
    self.files_cached += other.files_cached;
  }
}

/// Outcome of [`ProjectCompiler::compile_projects`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectsOutput {
  pub success: bool,
  pub summary: CompileSummary,
}

/// Path of the compile cache file inside a project's output directory.
pub fn cache_path(output_directory: &Path, project_name: &str) -> PathBuf {
  output_directory.join(format!("{COMPILE_CACHE_PREFIX}{project_name}.json"))
}

pub struct ProjectCompiler<'a> {
  driver: &'a ToolChainDriver,
  sources: &'a dyn SourceLister,
  force_rebuild: bool,
}

impl<'a> ProjectCompiler<'a> {
  pub fn new(driver: &'a ToolChainDriver, sources: &'a dyn SourceLister) -> Self {
    Self {
      driver,
      sources,
      force_rebuild: false,
    }
  }

  /// Ignore every cached artifact and recompile all sources.
  pub fn with_force_rebuild(mut self, force_rebuild: bool) -> Self {
    self.force_rebuild = force_rebuild;
    self
  }

  /// Compile `projects` in order, adding their objects to `link`.
  ///
  /// Each project compiles into `<link intermediate dir>/<project>` with a
  /// private copy of `compile`. Returns `Err` for configuration and
  /// missing-input errors; compiler failures are reported through
  /// [`ProjectsOutput::success`].
  pub async fn compile_projects(
    &self,
    compile: &CompileEnvironment,
    link: &mut LinkEnvironment,
    projects: &[ProjectDescriptor],
  ) -> Result<ProjectsOutput, BuildError> {
    self.check_projects(compile, projects)?;

    let mut output = ProjectsOutput {
      success: true,
      summary: CompileSummary::default(),
    };

    for project in projects {
      if !self.compile_project(compile, link, project, &mut output.summary).await? {
        error!(project = %project.name(), "project failed to compile");
        output.success = false;
        break;
      }
    }

    Ok(output)
  }

  /// Fail if a listed project has sources the toolchain can't compile.
  ///
  /// Runs before any compiler starts. Missing project files are left for
  /// [`compile_projects`](Self::compile_projects) to report in list order.
  pub fn check_projects(&self, compile: &CompileEnvironment, projects: &[ProjectDescriptor]) -> Result<(), BuildError> {
    let toolchain = self.driver.toolchain();
    for project in projects.iter().filter(|project| project.exists()) {
      let kinds: HashSet<SourceKind> = self
        .sources
        .project_sources(project)?
        .iter()
        .filter_map(|file| SourceKind::classify(file))
        .collect();
      for kind in SourceKind::ORDER.into_iter().filter(|kind| kinds.contains(kind)) {
        toolchain.check_source_kind(kind, compile.platform)?;
      }
    }
    Ok(())
  }

  async fn compile_project(
    &self,
    compile: &CompileEnvironment,
    link: &mut LinkEnvironment,
    project: &ProjectDescriptor,
    summary: &mut CompileSummary,
  ) -> Result<bool, BuildError> {
    if !project.exists() {
      return Err(BuildError::MissingProjectFile {
        path: project.path.clone(),
      });
    }

    let name = project.name();
    let output_directory = link.intermediate_directory.join(&name);
    tokio::fs::create_dir_all(&output_directory)
      .await
      .map_err(|e| BuildError::io(&output_directory, e))?;
    let environment = compile.for_project(&output_directory, project.directory());

    let cache_file = cache_path(&output_directory, &name);
    let mut cache = CompileCache::open(&cache_file);
    if self.force_rebuild {
      cache.clear();
    }

    let files = self.sources.project_sources(project)?;
    let mut buckets: HashMap<SourceKind, Vec<PathBuf>> = HashMap::new();
    let mut cached = Vec::new();

    for file in &files {
      let Some(kind) = SourceKind::classify(file) else {
        debug!(file = %file.display(), "not a compilable source, skipping");
        continue;
      };

      match hash_file(file) {
        Ok(hash) => match cache.status(file, &hash) {
          CacheStatus::Hit { compiled_file } => {
            debug!(file = %file.display(), "up to date");
            cached.push(compiled_file);
          }
          CacheStatus::Miss(reason) => {
            debug!(file = %file.display(), %reason, "needs compiling");
            buckets.entry(kind).or_default().push(file.clone());
          }
        },
        // let the driver surface the read failure as a compile failure
        Err(e) => {
          warn!(file = %file.display(), error = %e, "cannot hash source");
          buckets.entry(kind).or_default().push(file.clone());
        }
      }
    }

    summary.files_cached += cached.len();
    link.extend_input_files(cached);

    let listed: HashSet<&Path> = files.iter().map(PathBuf::as_path).collect();
    let pruned = cache.retain_sources(&listed);
    if pruned > 0 {
      debug!(project = %name, pruned, "dropped cache entries for removed sources");
    }

    let pending: usize = buckets.values().map(Vec::len).sum();
    if pending == 0 {
      if pruned > 0 || self.force_rebuild {
        save_cache(&cache, &cache_file);
      }
      info!(project = %name, "up to date");
      summary.projects_up_to_date += 1;
      return Ok(true);
    }

    info!(project = %name, files = pending, "compiling project");
    let mut success = true;
    for kind in SourceKind::ORDER {
      let Some(bucket) = buckets.get(&kind) else {
        continue;
      };

      let result = self
        .driver
        .compile_sources(&environment, bucket, kind, &mut cache)
        .await;
      let compiled = match result {
        Ok(compiled) => compiled,
        Err(e) => {
          save_cache(&cache, &cache_file);
          return Err(e);
        }
      };

      summary.files_compiled += compiled.object_files.len();
      link.extend_input_files(compiled.object_files);
      if !compiled.success {
        error!(project = %name, kind = %kind, "compilation failed");
        success = false;
        break;
      }
    }

    // keep what already compiled even when a bucket failed
    save_cache(&cache, &cache_file);

    if success {
      summary.projects_compiled += 1;
    }
    Ok(success)
  }
}

fn save_cache(cache: &CompileCache, path: &Path) {
  if let Err(e) = cache.save(path) {
    warn!(path = %path.display(), error = %e, "failed to save compile cache");
  }
}
