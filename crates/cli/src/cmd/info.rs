use std::path::PathBuf;

use anyhow::Result;

use anvil_lib::config::BuildOptions;
use anvil_lib::platform::Platform;

use crate::output::print_stat;

pub fn cmd_info(root: Option<PathBuf>) -> Result<()> {
  println!("anvil {}", env!("CARGO_PKG_VERSION"));
  println!();
  println!("System:");
  match Platform::host() {
    Some(platform) => print_stat("Platform", platform.as_str()),
    _ => print_stat("Platform", "unsupported host"),
  }

  let options = BuildOptions::from_env_with_root(root)?;
  println!();
  println!("Paths:");
  print_stat("Root", &options.root_dir.display().to_string());
  print_stat("Targets", &options.targets_dir().display().to_string());
  print_stat("Intermediate", &options.intermediate_dir.display().to_string());
  print_stat("Binaries", &options.binaries_dir.display().to_string());
  println!();
  print_stat("Jobs", &options.jobs.to_string());
  if let Some(timeout) = options.tool_timeout {
    print_stat("Tool timeout", &humantime::format_duration(timeout).to_string());
  }
  Ok(())
}
