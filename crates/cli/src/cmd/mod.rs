mod build;
mod info;
mod targets;

pub use build::{BuildArgs, cmd_build};
pub use info::cmd_info;
pub use targets::cmd_targets;
