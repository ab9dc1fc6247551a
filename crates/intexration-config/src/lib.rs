//! Configuration management for intexration
//!
//! Hierarchical configuration with discovery and precedence: CLI > file > defaults.
//! The TOML file carries `[server]`, `[compilation]`, `[paths]` and `[tools]` sections.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod persist;
mod sources;
mod tools;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, HOME_ENV_VAR};
pub use model::*;
pub use tools::ToolPaths;
