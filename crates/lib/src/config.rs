//! Build options.
//!
//! Options come from `ANVIL_*` environment variables; the CLI overrides
//! individual fields from its flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::consts::{
  BINARIES_DIR_NAME, ENV_BINARIES_DIR, ENV_INTERMEDIATE_DIR, ENV_JOBS, ENV_ROOT, ENV_TOOL_TIMEOUT,
  INTERMEDIATE_DIR_NAME, TARGETS_DIR,
};
use crate::error::ConfigError;
use crate::toolchain::DriverSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
  /// Source root holding `targets/` and the project files.
  pub root_dir: PathBuf,
  /// Root for objects and compile caches.
  pub intermediate_dir: PathBuf,
  /// Root for default output paths.
  pub binaries_dir: PathBuf,
  pub jobs: usize,
  pub tool_timeout: Option<Duration>,
  /// Clear every compile cache before use.
  pub force_rebuild: bool,
}

impl BuildOptions {
  /// Defaults for `root_dir`, with intermediate and binary roots beneath it.
  pub fn new(root_dir: impl Into<PathBuf>) -> Self {
    let root_dir = root_dir.into();
    Self {
      intermediate_dir: root_dir.join(INTERMEDIATE_DIR_NAME),
      binaries_dir: root_dir.join(BINARIES_DIR_NAME),
      root_dir,
      jobs: default_jobs(),
      tool_timeout: None,
      force_rebuild: false,
    }
  }

  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_env_with_root(None)
  }

  /// Read options from the environment. `root` takes precedence over
  /// `ANVIL_ROOT`, which falls back to the current directory.
  pub fn from_env_with_root(root: Option<PathBuf>) -> Result<Self, ConfigError> {
    let root = match root.or_else(|| env_path(ENV_ROOT)) {
      Some(root) => root,
      None => std::env::current_dir().map_err(|e| ConfigError::InvalidSetting {
        name: ENV_ROOT.to_string(),
        message: format!("cannot determine current directory: {e}"),
      })?,
    };

    let mut options = Self::new(absolute(&root, ENV_ROOT)?);
    if let Some(dir) = env_path(ENV_INTERMEDIATE_DIR) {
      options.intermediate_dir = absolute(&dir, ENV_INTERMEDIATE_DIR)?;
    }
    if let Some(dir) = env_path(ENV_BINARIES_DIR) {
      options.binaries_dir = absolute(&dir, ENV_BINARIES_DIR)?;
    }
    if let Some(jobs) = env_value(ENV_JOBS) {
      options.jobs = parse_jobs(&jobs)?;
    }
    if let Some(timeout) = env_value(ENV_TOOL_TIMEOUT) {
      options.tool_timeout = Some(parse_timeout(&timeout)?);
    }
    Ok(options)
  }

  pub fn targets_dir(&self) -> PathBuf {
    self.root_dir.join(TARGETS_DIR)
  }

  pub fn driver_settings(&self) -> DriverSettings {
    DriverSettings {
      jobs: self.jobs,
      tool_timeout: self.tool_timeout,
    }
  }
}

/// Parse a positive job count.
pub fn parse_jobs(value: &str) -> Result<usize, ConfigError> {
  match value.trim().parse::<usize>() {
    Ok(jobs) if jobs > 0 => Ok(jobs),
    _ => Err(ConfigError::InvalidSetting {
      name: ENV_JOBS.to_string(),
      message: format!("expected a positive integer, got '{value}'"),
    }),
  }
}

/// Parse a tool timeout such as `90s` or `10m`.
pub fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
  let invalid = |message: String| ConfigError::InvalidSetting {
    name: ENV_TOOL_TIMEOUT.to_string(),
    message,
  };
  let timeout = humantime::parse_duration(value.trim()).map_err(|e| invalid(format!("'{value}': {e}")))?;
  if timeout.is_zero() {
    return Err(invalid("timeout must be greater than zero".to_string()));
  }
  Ok(timeout)
}

fn default_jobs() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

fn env_value(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
  env_value(name).map(PathBuf::from)
}

fn absolute(path: &Path, name: &str) -> Result<PathBuf, ConfigError> {
  let resolved = if path.exists() {
    dunce::canonicalize(path)
  } else {
    std::path::absolute(path)
  };
  resolved.map_err(|e| ConfigError::InvalidSetting {
    name: name.to_string(),
    message: format!("{}: {e}", path.display()),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  fn clean_env() -> [(&'static str, Option<&'static str>); 5] {
    [
      (ENV_ROOT, None),
      (ENV_INTERMEDIATE_DIR, None),
      (ENV_BINARIES_DIR, None),
      (ENV_JOBS, None),
      (ENV_TOOL_TIMEOUT, None),
    ]
  }

  #[test]
  fn defaults_live_under_root() {
    let options = BuildOptions::new("/work/game");
    assert_eq!(options.intermediate_dir, PathBuf::from("/work/game/Intermediate"));
    assert_eq!(options.binaries_dir, PathBuf::from("/work/game/Binaries"));
    assert_eq!(options.targets_dir(), PathBuf::from("/work/game/targets"));
    assert!(options.jobs >= 1);
    assert_eq!(options.tool_timeout, None);
    assert!(!options.force_rebuild);
  }

  #[test]
  #[serial]
  fn reads_environment() {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    let root_str = root.to_str().unwrap().to_string();
    let int_str = root.join("obj").to_str().unwrap().to_string();

    temp_env::with_vars(
      [
        (ENV_ROOT, Some(root_str.as_str())),
        (ENV_INTERMEDIATE_DIR, Some(int_str.as_str())),
        (ENV_BINARIES_DIR, None),
        (ENV_JOBS, Some("3")),
        (ENV_TOOL_TIMEOUT, Some("2m")),
      ],
      || {
        let options = BuildOptions::from_env().unwrap();
        assert_eq!(options.root_dir, root);
        assert_eq!(options.intermediate_dir, root.join("obj"));
        assert_eq!(options.binaries_dir, root.join(BINARIES_DIR_NAME));
        assert_eq!(options.jobs, 3);
        assert_eq!(options.tool_timeout, Some(Duration::from_secs(120)));
      },
    );
  }

  #[test]
  #[serial]
  fn explicit_root_wins_over_environment() {
    let temp = TempDir::new().unwrap();
    let explicit = dunce::canonicalize(temp.path()).unwrap();

    let mut vars = clean_env();
    vars[0] = (ENV_ROOT, Some("/somewhere/else"));
    temp_env::with_vars(vars, || {
      let options = BuildOptions::from_env_with_root(Some(explicit.clone())).unwrap();
      assert_eq!(options.root_dir, explicit);
      assert_eq!(options.intermediate_dir, explicit.join(INTERMEDIATE_DIR_NAME));
    });
  }

  #[test]
  #[serial]
  fn invalid_jobs_is_a_config_error() {
    let mut vars = clean_env();
    vars[3] = (ENV_JOBS, Some("zero"));
    temp_env::with_vars(vars, || {
      let err = BuildOptions::from_env().unwrap_err();
      assert!(matches!(err, ConfigError::InvalidSetting { ref name, .. } if name == ENV_JOBS));
    });
  }

  #[test]
  #[serial]
  fn invalid_timeout_is_a_config_error() {
    let mut vars = clean_env();
    vars[4] = (ENV_TOOL_TIMEOUT, Some("soon"));
    temp_env::with_vars(vars, || {
      assert!(BuildOptions::from_env().is_err());
    });
  }

  #[test]
  fn parse_jobs_rejects_zero() {
    assert_eq!(parse_jobs("8").unwrap(), 8);
    assert!(parse_jobs("0").is_err());
    assert!(parse_jobs("-1").is_err());
  }

  #[test]
  fn parse_timeout_accepts_humantime() {
    assert_eq!(parse_timeout("90s").unwrap(), Duration::from_secs(90));
    assert_eq!(parse_timeout("1h 30m").unwrap(), Duration::from_secs(5400));
    assert!(parse_timeout("0s").is_err());
  }

  #[test]
  fn driver_settings_follow_options() {
    let mut options = BuildOptions::new("/r");
    options.jobs = 2;
    options.tool_timeout = Some(Duration::from_secs(5));
    let settings = options.driver_settings();
    assert_eq!(settings.jobs, 2);
    assert_eq!(settings.tool_timeout, Some(Duration::from_secs(5)));
  }
}
