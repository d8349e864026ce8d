//! Build command implementation.
//!
//! Parses the target/platform/configuration tokens, runs the build pipeline
//! and reports the outcome.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use anvil_lib::config::BuildOptions;
use anvil_lib::error::ConfigError;
use anvil_lib::project::ProjectRegistry;
use anvil_lib::target::{BuildOutcome, BuildRequest, BuildTarget};

use crate::output::{OutputFormat, format_duration, plural, print_error, print_info, print_json, print_stat, print_success};

pub struct BuildArgs {
  pub root: Option<PathBuf>,
  pub jobs: Option<usize>,
  pub timeout: Option<Duration>,
  pub rebuild: bool,
  pub output: OutputFormat,
  pub tokens: Vec<String>,
}

/// Execute the build command.
///
/// Returns `Ok(false)` when a compiler or linker failed; errors are reserved
/// for requests that could not be run at all.
pub fn cmd_build(args: BuildArgs) -> Result<bool> {
  let mut options = BuildOptions::from_env_with_root(args.root)?;
  if let Some(jobs) = args.jobs {
    options.jobs = jobs;
  }
  if args.timeout.is_some() {
    options.tool_timeout = args.timeout;
  }
  options.force_rebuild = args.rebuild;

  let registry = ProjectRegistry::load_dir(&options.root_dir).context("Failed to load targets")?;
  let request = match BuildRequest::parse(&args.tokens, &registry) {
    Ok(request) => request,
    Err(ConfigError::MissingProject) if !args.output.is_json() => {
      if !registry.is_empty() {
        print_info(&format!("Available targets: {}", registry.names().join(", ")));
      }
      return Err(ConfigError::MissingProject.into());
    }
    Err(err) => return Err(err.into()),
  };

  info!(
    root = %options.root_dir.display(),
    jobs = options.jobs,
    "starting build"
  );
  let mut target = BuildTarget::from_request(request, &registry, options)?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(target.build())?;

  if args.output.is_json() {
    print_json(&outcome)?;
  } else {
    print_outcome(&outcome);
  }

  Ok(outcome.success)
}

fn print_outcome(outcome: &BuildOutcome) {
  let label = format!(
    "{} - {} - {}",
    outcome.target,
    outcome.platform.as_str(),
    outcome.configuration.as_str()
  );

  if outcome.success {
    print_success(&format!("Built {label}"));
  } else {
    print_error(&format!("Build of {label} failed ({})", outcome.state));
  }

  let summary = &outcome.summary;
  println!();
  if outcome.success {
    print_stat("Output", &outcome.output_path.display().to_string());
  }
  print_stat(
    "Compiled",
    &format!(
      "{} in {}",
      plural(summary.files_compiled, "file"),
      plural(summary.projects_compiled, "project")
    ),
  );
  print_stat(
    "Cached",
    &format!(
      "{}, {} up to date",
      plural(summary.files_cached, "file"),
      plural(summary.projects_up_to_date, "project")
    ),
  );
  print_stat("Elapsed", &format_duration(outcome.elapsed));
}
