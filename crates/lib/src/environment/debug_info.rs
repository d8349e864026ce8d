use crate::platform::{Configuration, Platform, PlatformFamily};

/// Decide whether a build generates debug information.
///
/// Windows builds only carry debug info in the Debug configuration.
/// Platforms without a dedicated rule always generate it.
pub fn should_create_debug_info(platform: Platform, configuration: Configuration) -> bool {
  match platform.family() {
    PlatformFamily::Windows => configuration == Configuration::Debug,
    PlatformFamily::Unix | PlatformFamily::Unknown => true,
  }
}
