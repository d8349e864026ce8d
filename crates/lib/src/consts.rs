/// Directory (relative to the root) holding target descriptors.
pub const TARGETS_DIR: &str = "targets";

/// Default intermediate directory name, relative to the root.
pub const INTERMEDIATE_DIR_NAME: &str = "Intermediate";

/// Default binaries directory name, relative to the root.
pub const BINARIES_DIR_NAME: &str = "Binaries";

/// Prefix of the per-project compile cache file (`CompileCache-<Project>.json`).
pub const COMPILE_CACHE_PREFIX: &str = "CompileCache-";

/// Current compile cache file format version.
pub const COMPILE_CACHE_VERSION: u32 = 1;

pub const ENV_ROOT: &str = "ANVIL_ROOT";
pub const ENV_INTERMEDIATE_DIR: &str = "ANVIL_INTERMEDIATE_DIR";
pub const ENV_BINARIES_DIR: &str = "ANVIL_BINARIES_DIR";
pub const ENV_JOBS: &str = "ANVIL_JOBS";
pub const ENV_TOOL_TIMEOUT: &str = "ANVIL_TOOL_TIMEOUT";
