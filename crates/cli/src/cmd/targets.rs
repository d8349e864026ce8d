//! Lists the targets registered under `<root>/targets/`.

use std::path::PathBuf;

use anyhow::{Context, Result};

use anvil_lib::config::BuildOptions;
use anvil_lib::project::ProjectRegistry;

use crate::output::{OutputFormat, print_info, print_json, print_warning, symbols};

pub fn cmd_targets(root: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let options = BuildOptions::from_env_with_root(root)?;
  let registry = ProjectRegistry::load_dir(&options.root_dir).context("Failed to load targets")?;
  let names = registry.names();

  if output.is_json() {
    return print_json(&serde_json::json!({
      "root": options.root_dir,
      "targets": names,
    }));
  }

  if names.is_empty() {
    print_warning(&format!("No targets found in {}", options.targets_dir().display()));
    return Ok(());
  }

  print_info(&format!("Targets in {}:", options.targets_dir().display()));
  for name in names {
    println!("  {} {}", symbols::INFO, name);
  }
  Ok(())
}
