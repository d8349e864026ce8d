//! GCC/Clang-style toolchain for Linux64.

use std::path::Path;

use tracing::info;

use super::{CompileStep, ToolChain, ToolEnvironment, ToolInvocation};
use crate::environment::{CompileEnvironment, LinkEnvironment};
use crate::error::ConfigError;
use crate::platform::{Configuration, Platform};
use crate::project::SourceKind;

const DEFAULT_C_COMPILER: &str = "cc";
const DEFAULT_CPP_COMPILER: &str = "c++";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GnuToolChain {
  c_compiler: String,
  cpp_compiler: String,
}

impl Default for GnuToolChain {
  fn default() -> Self {
    Self::new(DEFAULT_C_COMPILER, DEFAULT_CPP_COMPILER)
  }
}

impl GnuToolChain {
  pub fn new(c_compiler: impl Into<String>, cpp_compiler: impl Into<String>) -> Self {
    Self {
      c_compiler: c_compiler.into(),
      cpp_compiler: cpp_compiler.into(),
    }
  }

  /// Compilers from `CC` and `CXX`, falling back to `cc` and `c++`.
  pub fn from_env() -> Self {
    let pick = |var: &str, default: &str| {
      std::env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
    };
    Self::new(pick("CC", DEFAULT_C_COMPILER), pick("CXX", DEFAULT_CPP_COMPILER))
  }

  pub fn c_compiler(&self) -> &str {
    &self.c_compiler
  }

  pub fn cpp_compiler(&self) -> &str {
    &self.cpp_compiler
  }

  fn unsupported(&self, feature: &str, platform: Platform) -> ConfigError {
    ConfigError::UnsupportedFeature {
      toolchain: self.name(),
      feature: feature.to_string(),
      platform,
    }
  }
}

impl ToolChain for GnuToolChain {
  fn name(&self) -> &'static str {
    "gnu"
  }

  fn bootstrap(&self, platform: Platform) -> Result<ToolEnvironment, ConfigError> {
    info!(
      platform = %platform,
      cc = %self.c_compiler,
      cxx = %self.cpp_compiler,
      "using GNU toolchain"
    );
    Ok(ToolEnvironment::default())
  }

  fn set_up_global_environment(&self, compile: &mut CompileEnvironment, _link: &mut LinkEnvironment) {
    compile.add_definition("PLATFORM_LINUX=1");
  }

  fn check_source_kind(&self, kind: SourceKind, platform: Platform) -> Result<(), ConfigError> {
    match kind {
      SourceKind::Resource => Err(self.unsupported("resource scripts", platform)),
      SourceKind::Cpp | SourceKind::C => Ok(()),
    }
  }

  fn check_link_environment(&self, environment: &LinkEnvironment) -> Result<(), ConfigError> {
    if environment.delay_load_libraries.is_empty() {
      Ok(())
    } else {
      Err(self.unsupported("delay-loaded libraries", environment.platform))
    }
  }

  fn compile_step(
    &self,
    environment: &CompileEnvironment,
    source: &Path,
    kind: SourceKind,
  ) -> Result<CompileStep, ConfigError> {
    self.check_source_kind(kind, environment.platform)?;
    let program = if kind == SourceKind::C {
      &self.c_compiler
    } else {
      &self.cpp_compiler
    };
    let object_file = environment.artifact_path(source, "o");

    let mut invocation = ToolInvocation::new(program.clone());
    invocation.arg("-c").arg("-fPIC");
    invocation.arg(if environment.configuration == Configuration::Debug {
      "-O0"
    } else {
      "-O2"
    });
    if environment.configuration == Configuration::Shipping {
      invocation.args(["-ffunction-sections", "-fdata-sections"]);
    }
    if environment.create_debug_info {
      invocation.arg("-g");
    }
    for include in environment.include_paths() {
      invocation.arg(format!("-I{}", include.display()));
    }
    for definition in environment.definitions() {
      invocation.arg(format!("-D{definition}"));
    }
    invocation
      .args(environment.additional_arguments.iter().cloned())
      .arg(source.display().to_string())
      .arg("-o")
      .arg(object_file.display().to_string());

    Ok(CompileStep {
      invocation,
      object_file,
      debug_file: None,
    })
  }

  fn link_step(&self, environment: &LinkEnvironment) -> Result<ToolInvocation, ConfigError> {
    self.check_link_environment(environment)?;

    let mut invocation = ToolInvocation::new(self.cpp_compiler.clone());
    if environment.output_extension() == "so" {
      invocation.arg("-shared");
    }
    if environment.create_debug_info {
      invocation.arg("-g");
    }
    if environment.is_shipping_binary {
      invocation.args(["-Wl,--gc-sections", "-s"]);
    }
    invocation
      .arg("-o")
      .arg(environment.output_file_path.display().to_string());

    invocation.args(environment.input_files().iter().map(|input| input.display().to_string()));

    for path in &environment.library_paths {
      invocation.arg(format!("-L{}", path.display()));
    }
    for library in &environment.excluded_libraries {
      invocation.arg(format!("-Wl,--exclude-libs,{library}"));
    }
    for library in &environment.additional_libraries {
      // explicit archives and shared objects are passed through as files
      if library.contains('/') || library.ends_with(".a") || library.contains(".so") {
        invocation.arg(library.clone());
      } else {
        invocation.arg(format!("-l{library}"));
      }
    }
    invocation.args(environment.additional_arguments.iter().cloned());

    Ok(invocation)
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;
  use serial_test::serial;

  fn compile_env(configuration: Configuration) -> CompileEnvironment {
    let mut env = CompileEnvironment::new(Platform::Linux64, configuration);
    env.output_directory = PathBuf::from("/int/Linux64/Debug/Core");
    env.source_directory = PathBuf::from("/src/Core");
    env
  }

  fn has(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
  }

  #[test]
  fn debug_compile_disables_optimizations() {
    let mut env = compile_env(Configuration::Debug);
    env.add_include_path("/src/Core/Include");
    env.add_definition("DEBUG=1");

    let step = GnuToolChain::default()
      .compile_step(&env, Path::new("/src/Core/Log.cpp"), SourceKind::Cpp)
      .unwrap();
    let args = &step.invocation.args;

    assert_eq!(step.invocation.program, "c++");
    for flag in ["-c", "-O0", "-g", "-I/src/Core/Include", "-DDEBUG=1"] {
      assert!(has(args, flag), "missing {flag}");
    }
    assert_eq!(step.object_file, PathBuf::from("/int/Linux64/Debug/Core/Log.cpp.o"));
    assert!(args.windows(2).any(|w| w[0] == "-o" && w[1] == "/int/Linux64/Debug/Core/Log.cpp.o"));
  }

  #[test]
  fn c_sources_use_c_compiler() {
    let mut env = compile_env(Configuration::Release);
    env.create_debug_info = false;

    let step = GnuToolChain::new("clang", "clang++")
      .compile_step(&env, Path::new("/src/zlib.c"), SourceKind::C)
      .unwrap();

    assert_eq!(step.invocation.program, "clang");
    assert!(has(&step.invocation.args, "-O2"));
    assert!(!has(&step.invocation.args, "-g"));
  }

  #[test]
  fn resource_scripts_are_unsupported() {
    let env = compile_env(Configuration::Debug);
    let err = GnuToolChain::default()
      .compile_step(&env, Path::new("/src/Game.rc"), SourceKind::Resource)
      .unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFeature { toolchain: "gnu", .. }));

    let toolchain = GnuToolChain::default();
    assert!(toolchain.check_source_kind(SourceKind::Resource, Platform::Linux64).is_err());
    assert!(toolchain.check_source_kind(SourceKind::Cpp, Platform::Linux64).is_ok());
    assert!(toolchain.check_source_kind(SourceKind::C, Platform::Linux64).is_ok());
  }

  #[test]
  fn shared_shipping_link() {
    let mut env = LinkEnvironment::new(Platform::Linux64, Configuration::Shipping);
    env.output_file_path = PathBuf::from("/bin/libgame.so");
    env.is_shipping_binary = true;
    env.add_input_file("/int/a.cpp.o");
    env.add_input_file("/int/b.c.o");
    env.add_library_path("/usr/local/lib");
    env.add_library("pthread");
    env.add_library("/opt/lib/libfoo.a");

    let invocation = GnuToolChain::default().link_step(&env).unwrap();
    let args = &invocation.args;

    for flag in [
      "-shared",
      "-Wl,--gc-sections",
      "-s",
      "/int/a.cpp.o",
      "/int/b.c.o",
      "-L/usr/local/lib",
      "-lpthread",
      "/opt/lib/libfoo.a",
    ] {
      assert!(has(args, flag), "missing {flag}");
    }
    let a = args.iter().position(|arg| arg == "/int/a.cpp.o").unwrap();
    let b = args.iter().position(|arg| arg == "/int/b.c.o").unwrap();
    assert!(a < b);
    assert!(invocation.response_file.is_none());
  }

  #[test]
  fn executable_link_is_not_shared() {
    let mut env = LinkEnvironment::new(Platform::Linux64, Configuration::Debug);
    env.output_file_path = PathBuf::from("/bin/game");
    let args = GnuToolChain::default().link_step(&env).unwrap().args;
    assert!(!has(&args, "-shared"));
    assert!(!has(&args, "-s"));
  }

  #[test]
  fn delay_loading_is_unsupported() {
    let mut env = LinkEnvironment::new(Platform::Linux64, Configuration::Debug);
    assert!(GnuToolChain::default().check_link_environment(&env).is_ok());

    env.add_delay_load_library("libfoo.so");
    assert!(GnuToolChain::default().check_link_environment(&env).is_err());
    assert!(GnuToolChain::default().link_step(&env).is_err());
  }

  #[test]
  #[serial]
  fn compilers_come_from_environment() {
    temp_env::with_vars([("CC", Some("gcc-13")), ("CXX", Some("g++-13"))], || {
      let toolchain = GnuToolChain::from_env();
      assert_eq!(toolchain.c_compiler(), "gcc-13");
      assert_eq!(toolchain.cpp_compiler(), "g++-13");
    });
  }

  #[test]
  #[serial]
  fn blank_compiler_variables_fall_back_to_defaults() {
    temp_env::with_vars([("CC", Some("")), ("CXX", None::<&str>)], || {
      assert_eq!(GnuToolChain::from_env(), GnuToolChain::default());
    });
  }
}
