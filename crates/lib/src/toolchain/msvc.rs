//! Visual C++ toolchain for Win32 and Win64.
//!
//! `cl`, `rc` and `link` are resolved through `PATH`, so the build must run
//! from an initialized developer environment.

use std::path::{Path, PathBuf};

use tracing::info;

use super::{CompileStep, ResponseFile, ToolChain, ToolEnvironment, ToolInvocation};
use crate::environment::{CompileEnvironment, LinkEnvironment};
use crate::error::ConfigError;
use crate::platform::{Configuration, Platform};
use crate::project::SourceKind;

const INSTALL_DIR_VAR: &str = "VCINSTALLDIR";
const VERSION_VAR: &str = "VisualStudioVersion";

#[derive(Debug, Clone, Copy, Default)]
pub struct MsvcToolChain;

impl MsvcToolChain {
  pub fn new() -> Self {
    Self
  }

  fn global_compile_arguments(environment: &CompileEnvironment) -> Vec<String> {
    let mut args: Vec<String> = ["/nologo", "/Oi", "/Gy", "/fp:fast", "/c"]
      .into_iter()
      .map(String::from)
      .collect();

    let debug_runtime = environment.configuration == Configuration::Debug;
    if debug_runtime {
      args.push("/Od".into());
    } else {
      args.extend(["/Ox", "/Ot", "/Ob2"].map(String::from));
      if environment.configuration == Configuration::Shipping {
        // link-time code generation
        args.push("/GL".into());
      }
    }

    // SSE options are rejected by the 64-bit compiler
    if environment.platform == Platform::Win32 {
      args.push("/arch:SSE2".into());
    }
    args.extend(["/errorReport:prompt", "/EHsc"].map(String::from));

    if environment.create_debug_info {
      args.push("/Zi".into());
    }

    args.push(if debug_runtime { "/MDd" } else { "/MD" }.into());

    for include in environment.include_paths() {
      args.push("/I".into());
      args.push(include.display().to_string());
    }
    for definition in environment.definitions() {
      args.push("/D".into());
      args.push(definition.clone());
    }
    args.extend(environment.additional_arguments.iter().cloned());
    args
  }

  fn language_arguments(kind: SourceKind) -> &'static [&'static str] {
    match kind {
      SourceKind::Cpp => &["/TP", "/WX", "/W4", "/wd4996", "/wd4100"],
      // external C code is compiled without warnings
      SourceKind::C => &["/TC", "/W0"],
      SourceKind::Resource => &[],
    }
  }

  fn cl_step(environment: &CompileEnvironment, source: &Path, kind: SourceKind) -> CompileStep {
    let object_file = environment.artifact_path(source, "obj");

    let mut invocation = ToolInvocation::new("cl");
    invocation
      .args(Self::global_compile_arguments(environment))
      .arg(source.display().to_string())
      .arg(format!("/Fo{}", object_file.display()))
      .args(Self::language_arguments(kind).iter().copied());

    let debug_file = if environment.configuration == Configuration::Debug {
      let pdb = environment.artifact_path(source, "pdb");
      invocation.arg(format!("/Fd{}", pdb.display()));
      Some(pdb)
    } else {
      None
    };

    CompileStep {
      invocation,
      object_file,
      debug_file,
    }
  }

  fn rc_step(environment: &CompileEnvironment, source: &Path) -> CompileStep {
    let object_file = environment.artifact_path(source, "res");

    let mut invocation = ToolInvocation::new("rc");
    invocation.arg("/nologo");
    // lets .rc files switch on _WIN64
    if environment.platform == Platform::Win64 {
      invocation.args(["/D", "_WIN64=1"]);
    }
    invocation.args(["/l", "0x409"]);
    for include in environment.include_paths() {
      invocation.arg("/i").arg(include.display().to_string());
    }
    for definition in environment.definitions() {
      invocation.arg("/d").arg(definition.clone());
    }
    invocation
      .arg(format!("/fo{}", object_file.display()))
      .arg(source.display().to_string());

    CompileStep {
      invocation,
      object_file,
      debug_file: None,
    }
  }

  fn global_link_arguments(environment: &LinkEnvironment) -> Vec<String> {
    let mut args: Vec<String> = vec!["/MANIFEST:NO".into(), "/NOLOGO".into()];
    if environment.create_debug_info {
      args.push("/DEBUG".into());
    }
    args.push("/errorReport:prompt".into());

    let is_64_bit = environment.platform == Platform::Win64;
    args.push(if is_64_bit { "/MACHINE:x64" } else { "/MACHINE:x86" }.into());
    args.extend(["/SUBSYSTEM:WINDOWS", "/FIXED:No"].map(String::from));
    if environment.platform == Platform::Win32 {
      args.push("/LARGEADDRESSAWARE".into());
    }
    args.push("/NXCOMPAT".into());

    let stack = if environment.is_shipping_binary {
      "/STACK:1000000,1000000"
    } else if is_64_bit {
      "/STACK:6500000,5000000"
    } else {
      "/STACK:5000000,5000000"
    };
    args.push(stack.into());

    if environment.is_shipping_binary {
      args.extend(["/RELEASE", "/OPT:REF", "/OPT:ICF"].map(String::from));
    } else {
      args.extend(["/OPT:NOREF", "/OPT:NOICF"].map(String::from));
    }

    if environment.output_extension() == "dll" {
      args.push("/DLL".into());
    }
    args
  }
}

fn absolute(path: &Path) -> PathBuf {
  std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn vcvars_script(platform: Platform) -> &'static str {
  if platform == Platform::Win64 {
    "vcvarsx86_amd64.bat"
  } else {
    "vcvars32.bat"
  }
}

impl ToolChain for MsvcToolChain {
  fn name(&self) -> &'static str {
    "msvc"
  }

  fn bootstrap(&self, platform: Platform) -> Result<ToolEnvironment, ConfigError> {
    let install_dir = std::env::var(INSTALL_DIR_VAR).unwrap_or_default();
    if install_dir.is_empty() {
      return Err(ConfigError::ToolchainUnavailable(format!(
        "Visual Studio environment is not initialized; run {} or build from a developer command prompt to target {}.",
        vcvars_script(platform),
        platform
      )));
    }

    let version = std::env::var(VERSION_VAR).unwrap_or_else(|_| "unknown".to_string());
    info!(install_dir = %install_dir, version = %version, "using Visual Studio toolchain");
    Ok(ToolEnvironment::default())
  }

  fn set_up_global_environment(&self, compile: &mut CompileEnvironment, _link: &mut LinkEnvironment) {
    compile.add_definition("PLATFORM_WINDOWS=1");
    if compile.platform == Platform::Win64 {
      compile.add_definition("WIN64=1");
    } else {
      compile.add_definition("WIN32=1");
    }
  }

  fn compile_step(
    &self,
    environment: &CompileEnvironment,
    source: &Path,
    kind: SourceKind,
  ) -> Result<CompileStep, ConfigError> {
    if !environment.platform.is_windows() {
      return Err(ConfigError::UnsupportedPlatform(environment.platform));
    }
    Ok(match kind {
      SourceKind::Cpp | SourceKind::C => Self::cl_step(environment, source, kind),
      SourceKind::Resource => Self::rc_step(environment, source),
    })
  }

  fn link_step(&self, environment: &LinkEnvironment) -> Result<ToolInvocation, ConfigError> {
    if !environment.platform.is_windows() {
      return Err(ConfigError::UnsupportedPlatform(environment.platform));
    }

    let mut invocation = ToolInvocation::new("link");
    invocation.args(Self::global_link_arguments(environment));

    for library in &environment.delay_load_libraries {
      invocation.arg(format!("/DELAYLOAD:{library}"));
    }
    for path in &environment.library_paths {
      invocation.arg(format!("/LIBPATH:{}", path.display()));
    }
    for library in &environment.excluded_libraries {
      invocation.arg(format!("/NODEFAULTLIB:{library}"));
    }

    let lines = environment
      .input_files()
      .iter()
      .map(|input| format!("\"{}\"", absolute(input).display()))
      .chain(
        environment
          .additional_libraries
          .iter()
          .map(|library| format!("\"{library}\"")),
      )
      .collect();
    let output_file = absolute(&environment.output_file_path);
    let output_name = output_file
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default();
    let response_path = environment
      .intermediate_directory
      .join(format!("{output_name}.response"));
    invocation.arg(format!("@{}", response_path.display()));
    invocation.response_file = Some(ResponseFile {
      path: response_path,
      lines,
    });

    invocation.arg(format!("/OUT:{}", output_file.display()));

    if environment.create_debug_info {
      let pdb = environment.output_directory.join(format!(
        "{}.pdb",
        output_file
          .file_stem()
          .map(|stem| stem.to_string_lossy().into_owned())
          .unwrap_or_default()
      ));
      invocation.arg(format!("/PDB:{}", pdb.display()));
    }

    invocation.args(environment.additional_arguments.iter().cloned());

    if environment.configuration == Configuration::Shipping && environment.platform == Platform::Win64 {
      invocation.arg(format!("/MAP:{}.map", output_file.display()));
    }

    Ok(invocation)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  fn compile_env(platform: Platform, configuration: Configuration) -> CompileEnvironment {
    let mut env = CompileEnvironment::new(platform, configuration);
    env.output_directory = PathBuf::from("/int/Win64/Debug/Game");
    env.source_directory = PathBuf::from("/src");
    env
  }

  fn link_env(platform: Platform, configuration: Configuration, output: &str) -> LinkEnvironment {
    let mut env = LinkEnvironment::new(platform, configuration);
    env.output_file_path = PathBuf::from(output);
    env.output_directory = PathBuf::from("/bin");
    env.intermediate_directory = PathBuf::from("/int/Win64/Debug");
    env
  }

  fn has(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
  }

  #[test]
  fn debug_cpp_compile_uses_debug_runtime_and_pdb() {
    let mut env = compile_env(Platform::Win64, Configuration::Debug);
    env.create_debug_info = true;
    env.add_include_path("/src/Engine/Include");
    env.add_definition("DEBUG=1");

    let step = MsvcToolChain::new()
      .compile_step(&env, Path::new("/src/Main.cpp"), SourceKind::Cpp)
      .unwrap();
    let args = &step.invocation.args;

    assert_eq!(step.invocation.program, "cl");
    assert!(has(args, "/Od"));
    assert!(has(args, "/MDd"));
    assert!(has(args, "/Zi"));
    assert!(has(args, "/TP"));
    assert!(has(args, "/WX"));
    assert!(!has(args, "/arch:SSE2"));
    assert!(args.windows(2).any(|w| w[0] == "/I" && w[1] == "/src/Engine/Include"));
    assert!(args.windows(2).any(|w| w[0] == "/D" && w[1] == "DEBUG=1"));
    assert_eq!(step.object_file, PathBuf::from("/int/Win64/Debug/Game/Main.cpp.obj"));
    assert_eq!(
      step.debug_file,
      Some(PathBuf::from("/int/Win64/Debug/Game/Main.cpp.pdb"))
    );
  }

  #[test]
  fn shipping_c_compile_optimizes_without_pdb() {
    let mut env = compile_env(Platform::Win32, Configuration::Shipping);
    env.create_debug_info = false;

    let step = MsvcToolChain::new()
      .compile_step(&env, Path::new("/src/zlib.c"), SourceKind::C)
      .unwrap();
    let args = &step.invocation.args;

    for flag in ["/Ox", "/Ot", "/Ob2", "/GL", "/arch:SSE2", "/MD", "/TC", "/W0"] {
      assert!(has(args, flag), "missing {flag}");
    }
    assert!(!has(args, "/Zi"));
    assert!(!has(args, "/TP"));
    assert_eq!(step.debug_file, None);
  }

  #[test]
  fn resource_compile_uses_rc() {
    let mut env = compile_env(Platform::Win64, Configuration::Release);
    env.add_definition("RELEASE=1");

    let step = MsvcToolChain::new()
      .compile_step(&env, Path::new("/src/Game.rc"), SourceKind::Resource)
      .unwrap();
    let args = &step.invocation.args;

    assert_eq!(step.invocation.program, "rc");
    assert!(args.windows(2).any(|w| w[0] == "/D" && w[1] == "_WIN64=1"));
    assert!(args.windows(2).any(|w| w[0] == "/d" && w[1] == "RELEASE=1"));
    assert_eq!(args.last().map(String::as_str), Some("/src/Game.rc"));
    assert_eq!(step.object_file, PathBuf::from("/int/Win64/Debug/Game/Game.rc.res"));
  }

  #[test]
  fn development_link_keeps_symbols() {
    let mut env = link_env(Platform::Win64, Configuration::Debug, "/bin/Game.exe");
    env.create_debug_info = true;
    env.add_input_file("/int/Game/Main.cpp.obj");
    env.add_library("user32.lib");
    env.add_delay_load_library("d3d11.dll");

    let invocation = MsvcToolChain::new().link_step(&env).unwrap();
    let args = &invocation.args;

    assert_eq!(invocation.program, "link");
    for flag in [
      "/DEBUG",
      "/MACHINE:x64",
      "/STACK:6500000,5000000",
      "/OPT:NOREF",
      "/OPT:NOICF",
      "/DELAYLOAD:d3d11.dll",
      "/PDB:/bin/Game.pdb",
    ] {
      assert!(has(args, flag), "missing {flag}");
    }
    assert!(!has(args, "/DLL"));

    let response = invocation.response_file.unwrap();
    assert_eq!(response.path, PathBuf::from("/int/Win64/Debug/Game.exe.response"));
    assert_eq!(
      response.lines,
      vec!["\"/int/Game/Main.cpp.obj\"".to_string(), "\"user32.lib\"".to_string()]
    );
    assert!(has(args, "@/int/Win64/Debug/Game.exe.response"));
  }

  #[test]
  fn shipping_win64_dll_link() {
    let mut env = link_env(Platform::Win64, Configuration::Shipping, "/bin/Game.dll");
    env.is_shipping_binary = true;

    let args = MsvcToolChain::new().link_step(&env).unwrap().args;

    for flag in ["/RELEASE", "/OPT:REF", "/OPT:ICF", "/STACK:1000000,1000000", "/DLL"] {
      assert!(has(&args, flag), "missing {flag}");
    }
    assert!(has(&args, "/MAP:/bin/Game.dll.map"));
    assert!(!has(&args, "/DEBUG"));
  }

  #[test]
  fn win32_link_is_large_address_aware() {
    let env = link_env(Platform::Win32, Configuration::Release, "/bin/Game.exe");
    let args = MsvcToolChain::new().link_step(&env).unwrap().args;
    assert!(has(&args, "/MACHINE:x86"));
    assert!(has(&args, "/LARGEADDRESSAWARE"));
    assert!(has(&args, "/STACK:5000000,5000000"));
  }

  #[test]
  fn rejects_non_windows_platforms() {
    let env = compile_env(Platform::Linux64, Configuration::Debug);
    let result = MsvcToolChain::new().compile_step(&env, Path::new("a.cpp"), SourceKind::Cpp);
    assert!(matches!(result, Err(ConfigError::UnsupportedPlatform(Platform::Linux64))));
  }

  #[test]
  fn global_environment_defines_platform() {
    let mut compile = CompileEnvironment::new(Platform::Win64, Configuration::Debug);
    let mut link = LinkEnvironment::new(Platform::Win64, Configuration::Debug);
    MsvcToolChain::new().set_up_global_environment(&mut compile, &mut link);
    assert!(compile.has_definition("PLATFORM_WINDOWS=1"));
    assert!(compile.has_definition("WIN64=1"));
  }

  #[test]
  #[serial]
  fn bootstrap_requires_developer_environment() {
    temp_env::with_var_unset(INSTALL_DIR_VAR, || {
      let err = MsvcToolChain::new().bootstrap(Platform::Win64).unwrap_err();
      assert!(err.to_string().contains("vcvarsx86_amd64.bat"));
    });
  }

  #[test]
  #[serial]
  fn bootstrap_accepts_initialized_environment() {
    temp_env::with_vars(
      [
        (INSTALL_DIR_VAR, Some("C:\\VS\\VC\\")),
        (VERSION_VAR, Some("17.0")),
      ],
      || {
        assert!(MsvcToolChain::new().bootstrap(Platform::Win32).is_ok());
      },
    );
  }
}
