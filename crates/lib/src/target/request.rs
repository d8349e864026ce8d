//! What to build, parsed from command-line tokens.

use std::path::PathBuf;

use tracing::debug;

use crate::error::ConfigError;
use crate::platform::{Configuration, Platform};
use crate::project::ProjectRegistry;

const OUTPUT_FLAG: &str = "-output";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
  /// Registered target name.
  pub project: String,
  pub platform: Platform,
  pub configuration: Configuration,
  /// Explicit output file. Relative paths resolve against the working
  /// directory.
  pub output_path: Option<PathBuf>,
}

impl BuildRequest {
  pub fn new(project: impl Into<String>, platform: Platform, configuration: Configuration) -> Self {
    Self {
      project: project.into(),
      platform,
      configuration,
      output_path: None,
    }
  }

  pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.output_path = Some(path.into());
    self
  }

  /// Parse free-form tokens such as `TestbedGame Win64 Debug -output Game.exe`.
  ///
  /// Tokens are matched case-insensitively against registered targets,
  /// platforms and configurations. Anything unrecognized is ignored.
  pub fn parse<S: AsRef<str>>(tokens: &[S], registry: &ProjectRegistry) -> Result<Self, ConfigError> {
    let mut project = None;
    let mut platform = Platform::Unknown;
    let mut configuration = Configuration::Unknown;
    let mut output_path = None;

    let mut tokens = tokens.iter().map(AsRef::as_ref);
    while let Some(token) = tokens.next() {
      if token.eq_ignore_ascii_case(OUTPUT_FLAG) {
        let path = tokens.next().ok_or_else(|| ConfigError::MissingArgumentValue {
          flag: OUTPUT_FLAG.to_string(),
        })?;
        output_path = Some(PathBuf::from(path));
      } else if let Some(name) = registry.resolve(token).map(|p| p.name().to_string()) {
        project = Some(name);
      } else if let Some(parsed) = Platform::from_name(token) {
        platform = parsed;
      } else if let Some(parsed) = Configuration::from_name(token) {
        configuration = parsed;
      } else {
        debug!(token, "ignoring unrecognized argument");
      }
    }

    if platform == Platform::Unknown {
      return Err(ConfigError::MissingPlatform);
    }
    if configuration == Configuration::Unknown {
      return Err(ConfigError::MissingConfiguration);
    }
    let project = project.ok_or(ConfigError::MissingProject)?;

    Ok(Self {
      project,
      platform,
      configuration,
      output_path,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::project::TargetDescriptor;

  fn registry() -> ProjectRegistry {
    let mut registry = ProjectRegistry::new();
    let descriptor: TargetDescriptor = serde_json::from_str(r#"{ "name": "TestbedGame" }"#).unwrap();
    registry.register(Arc::new(descriptor));
    registry
  }

  #[test]
  fn parses_project_platform_and_configuration() {
    let request = BuildRequest::parse(&["TestbedGame", "Win64", "Debug"], &registry()).unwrap();
    assert_eq!(
      request,
      BuildRequest::new("TestbedGame", Platform::Win64, Configuration::Debug)
    );
  }

  #[test]
  fn tokens_are_case_insensitive_and_order_free() {
    let request = BuildRequest::parse(&["shipping", "testbedgame", "WIN32"], &registry()).unwrap();
    assert_eq!(request.project, "TestbedGame");
    assert_eq!(request.platform, Platform::Win32);
    assert_eq!(request.configuration, Configuration::Shipping);
  }

  #[test]
  fn unknown_tokens_are_ignored() {
    let request = BuildRequest::parse(
      &["-waitmutex", "TestbedGame", "Win64", "--frobnicate", "Release"],
      &registry(),
    )
    .unwrap();
    assert_eq!(request.configuration, Configuration::Release);
  }

  #[test]
  fn output_flag_takes_next_token() {
    let request = BuildRequest::parse(
      &["TestbedGame", "Win64", "Debug", "-OUTPUT", "out/Game.dll"],
      &registry(),
    )
    .unwrap();
    assert_eq!(request.output_path, Some(PathBuf::from("out/Game.dll")));
  }

  #[test]
  fn output_flag_without_value_is_an_error() {
    let err = BuildRequest::parse(&["TestbedGame", "Win64", "Debug", "-output"], &registry()).unwrap_err();
    assert_eq!(
      err.to_string(),
      "Expected path after -output argument, but found nothing."
    );
  }

  #[test]
  fn missing_pieces_are_reported() {
    let registry = registry();
    assert!(matches!(
      BuildRequest::parse(&["TestbedGame", "Debug"], &registry),
      Err(ConfigError::MissingPlatform)
    ));
    assert!(matches!(
      BuildRequest::parse(&["TestbedGame", "Win64"], &registry),
      Err(ConfigError::MissingConfiguration)
    ));
    assert!(matches!(
      BuildRequest::parse(&["OtherGame", "Win64", "Debug"], &registry),
      Err(ConfigError::MissingProject)
    ));
  }
}
