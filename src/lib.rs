//! intexration - continuous compilation of LaTeX documents
//!
//! A repository host notifies intexration on every push. The pushed ref is fetched,
//! each top-level document in it is compiled with the configured compiler, and the
//! resulting PDF is kept at `output_dir/owner/repository/name.pdf` where it can be
//! looked up by identifier.
//!
//! intexration can be used in two ways:
//! - **CLI**: the `intexration` binary submits payloads, resolves documents and manages
//!   keys and configuration
//! - **Library**: embed an [`Orchestrator`] behind your own HTTP transport
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use intexration::{CliArgs, Config, KeyStore, Orchestrator, WebhookGateway};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::discover(&CliArgs::default())?;
//!     let orchestrator = Orchestrator::from_config(&config)?;
//!     let keys = KeyStore::new(config.api_keys_path());
//!
//!     let payload = r#"{"repository": {"url": "https://github.com/acme/paper", "name": "paper"}, "after": "abc123"}"#;
//!     let summary = WebhookGateway::new(&orchestrator, &keys).handle("s3cret", payload)?;
//!     print!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! # Stable Public API
//!
//! - [`Orchestrator`], [`OrchestratorConfig`], [`BatchSummary`]
//! - [`Identifier`], [`Document`], [`BuildRequest`], [`Submission`]
//! - [`Config`], [`ConfigBuilder`], [`CliArgs`]
//! - [`IntexrationError`], [`BuildError`], [`ExitCode`]
//!
//! Everything else is reachable through the crate re-exports but is not covered by semver.

// ============================================================================
// Stable Public API
// ============================================================================

pub use intexration_engine::{
    BatchSummary, BuildRequest, CompileOutcome, Document, Identifier, KeyStore, Orchestrator,
    OrchestratorConfig, Submission, WebhookGateway, decode_payload,
};

pub use intexration_config::{CliArgs, Config, ConfigBuilder, ConfigSource};

pub use intexration_utils::error::{
    BuildError, ConfigError, ErrorCategory, IntexrationError, UserFriendlyError, WebhookError,
};

pub use intexration_utils::exit_codes::ExitCode;

// ============================================================================
// Internal modules (not part of stable public API)
// ============================================================================

pub use intexration_config as config;
pub use intexration_engine as engine;
pub use intexration_runner as runner;
pub use intexration_utils::{atomic_write, error, exit_codes, logging};

pub mod cli;
