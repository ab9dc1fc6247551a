//! Command-line interface.
//!
//! `run()` owns all output; `main` only turns its error into a process exit code.

pub mod args;
mod commands;
mod run;

#[cfg(test)]
mod tests;

pub use args::{Cli, Commands, ConfigCommands, KeysCommands};
pub use run::run;
