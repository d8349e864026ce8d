//! anvil-lib: Core types and logic for Anvil
//!
//! This crate builds native C/C++ targets incrementally:
//! - `BuildTarget`: the per-invocation pipeline from configuration to link
//! - `ProjectCompiler`: compiles project lists, reusing cached artifacts
//! - `CompileCache`: per-project record of source hashes and artifacts
//! - `ToolChain`: turns build environments into compiler and linker runs

pub mod cache;
pub mod compile;
pub mod config;
pub mod consts;
pub mod environment;
pub mod error;
pub mod platform;
pub mod project;
pub mod target;
pub mod toolchain;
pub mod util;
