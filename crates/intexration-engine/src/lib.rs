//! Build orchestration for intexration.
//!
//! A webhook submission is fetched by the [clone stage](stages::CloneStage), every
//! document found in it becomes a [`BuildRequest`], and the [`Orchestrator`] either
//! compiles those right away (eager) or queues them until the first lookup (lazy).

pub mod compiler;
pub mod discovery;
pub mod keys;
pub mod model;
pub mod orchestrator;
pub mod pool;
pub mod queue;
pub mod scm;
pub mod stages;
pub mod store;
pub mod webhook;

pub use compiler::{Compiler, LatexCompiler};
pub use keys::KeyStore;
pub use model::{BuildRequest, Document, Identifier, Submission};
pub use orchestrator::{BatchSummary, CompileOutcome, Orchestrator, OrchestratorConfig};
pub use queue::BuildQueue;
pub use scm::{GitClient, SourceControl};
pub use store::DocumentStore;
pub use webhook::{WebhookGateway, decode_payload};
