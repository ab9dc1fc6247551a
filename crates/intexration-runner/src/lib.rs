//! Process execution for the external tools intexration drives (git, latexmk).
//!
//! All process execution goes through [`CommandSpec`] to ensure argv-style invocation.
//! Webhook payloads carry attacker-influenced strings (repository URLs, refs), so
//! arguments are always passed as discrete elements and never through a shell.

pub mod command_spec;
pub mod error;
pub mod native;
pub mod process;

pub use command_spec::CommandSpec;
pub use error::RunnerError;
pub use native::NativeRunner;
pub use process::{ProcessOutput, ProcessRunner};
