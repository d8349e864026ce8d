mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anvil_lib::config::{parse_jobs, parse_timeout};
use anvil_lib::error::{BuildError, ConfigError};
use anvil_lib::project::ProjectError;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{BuildArgs, cmd_build, cmd_info, cmd_targets};
use crate::output::{OutputFormat, print_error};

/// anvil - Incremental native build orchestrator
#[derive(Parser)]
#[command(name = "anvil")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Source root holding targets/ and project files (overrides ANVIL_ROOT)
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a target, e.g. `anvil build TestbedGame Win64 Debug -output Game.exe`
  Build {
    /// Maximum concurrent compiler processes (overrides ANVIL_JOBS)
    #[arg(long, value_parser = parse_jobs)]
    jobs: Option<usize>,

    /// Kill any compiler or linker running longer than this, e.g. `10m`
    #[arg(long, value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// Ignore compile caches and rebuild every source
    #[arg(long)]
    rebuild: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Target, platform, configuration and `-output <path>`, in any order
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true, trailing_var_arg = true)]
    args: Vec<String>,
  },

  /// List the targets that can be built
  Targets {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
  },

  /// Display version and host information
  Info,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let result = match cli.command {
    Commands::Build {
      jobs,
      timeout,
      rebuild,
      format,
      args,
    } => cmd_build(BuildArgs {
      root: cli.root,
      jobs,
      timeout,
      rebuild,
      output: format,
      tokens: args,
    }),
    Commands::Targets { format } => cmd_targets(cli.root, format).map(|()| true),
    Commands::Info => cmd_info(cli.root).map(|()| true),
  };

  match result {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(err) => {
      report_error(&err, cli.verbose);
      ExitCode::FAILURE
    }
  }
}

fn init_tracing(verbose: bool) {
  let default_level = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(verbose)
    .without_time()
    .init();
}

/// Expected errors get their one-line message; anything else gets the full chain.
fn report_error(err: &anyhow::Error, verbose: bool) {
  let user_error = err.chain().find(|cause| {
    cause.downcast_ref::<ConfigError>().is_some()
      || cause.downcast_ref::<ProjectError>().is_some()
      || cause.downcast_ref::<BuildError>().is_some_and(BuildError::is_user_error)
  });

  match user_error {
    Some(cause) if !verbose => print_error(&cause.to_string()),
    _ => print_error(&format!("{err:?}")),
  }
}
