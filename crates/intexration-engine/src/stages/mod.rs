//! The two build stages: fetching a submission and compiling one document.

mod clone;
mod compile;

pub use clone::{CloneStage, Checkout};
pub use compile::{CompileStage, CompiledArtifact};
