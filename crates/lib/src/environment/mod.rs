//! Compile and link environments.
//!
//! Environments are plain values describing *what* to build. Toolchains
//! turn them into command lines. Cloning an environment is a deep copy, so
//! a project can adjust its own copy without affecting its siblings.

mod compile;
mod debug_info;
mod link;

pub use compile::CompileEnvironment;
pub use debug_info::should_create_debug_info;
pub use link::LinkEnvironment;
