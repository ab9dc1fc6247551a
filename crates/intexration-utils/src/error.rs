use std::fmt;
use thiserror::Error;

pub use intexration_runner::RunnerError;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `IntexrationError` is the error returned across crate boundaries. It provides:
/// - Detailed error information for programmatic handling
/// - User-friendly messages with context and suggestions
/// - Mapping to CLI exit codes (and, for the transport collaborator, response classes)
///
/// # Error Categories
///
/// | Category | Description |
/// |----------|-------------|
/// | `Config` | Configuration file, settings or missing startup resources |
/// | `Build` | Document lookup, fetch and compile failures |
/// | `Runner` | Process execution errors outside a build |
/// | `Webhook` | Payload decoding and authorization |
/// | `Keys` | API key store I/O |
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration invalid / missing resource |
/// | 4 | Build not found |
/// | 5 | Unauthorized webhook |
/// | 6 | Fetch failure |
/// | 7 | Compile failure / artifact missing |
/// | 10 | Timeout |
/// | 1 | Other errors |
///
/// Library code returns `IntexrationError` and does NOT call `std::process::exit()`.
#[derive(Error, Debug)]
pub enum IntexrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    #[error("API key store error: {0}")]
    Keys(#[from] KeyStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Lookup,
    SourceControl,
    Compilation,
    FileSystem,
    Security,
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Lookup => write!(f, "Lookup"),
            Self::SourceControl => write!(f, "Source Control"),
            Self::Compilation => write!(f, "Compilation"),
            Self::FileSystem => write!(f, "File System"),
            Self::Security => write!(f, "Security"),
            Self::Validation => write!(f, "Validation"),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration-related errors. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required resource: {resource}")]
    MissingResource { resource: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => format!("Configuration file has invalid format: {reason}"),
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::MissingResource { resource } => {
                format!("A resource required at startup is missing: {resource}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [server], [compilation], [paths] and [tools] sections."
                    .to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' option is checked at startup; the service does not start with an invalid value."
            )),
            Self::MissingResource { .. } => Some(
                "intexration needs its settings file and the git and LaTeX tool binaries before accepting work."
                    .to_string(),
            ),
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => Some(
                "intexration searches for .intexration/config.toml in INTEXRATION_HOME, then upward from the current directory."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax using a TOML validator".to_string(),
                "Run 'intexration config show' to see the effective configuration".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "server.port" => vec!["Use a port between 1 and 65535".to_string()],
                "compilation.max_workers" => {
                    vec!["Use a worker count between 1 and 64".to_string()]
                }
                k if k.ends_with("timeout_secs") => {
                    vec!["Use a timeout between 5 and 7200 seconds".to_string()]
                }
                _ => vec!["Check the documentation for valid values".to_string()],
            },
            Self::MissingResource { resource } => vec![
                format!("Install or create '{resource}'"),
                "Set [tools] git / compiler to absolute paths if the binaries are not on PATH"
                    .to_string(),
            ],
            Self::NotFound { path } => vec![format!("Create the configuration file at {path}")],
            Self::DiscoveryFailed { .. } => {
                vec!["Pass an explicit path with --config".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

// ============================================================================
// Builds
// ============================================================================

/// Errors raised by the build orchestration engine.
///
/// `BuildNotFound` is a client-visible miss and is never retried.
/// `CompileFailure` and `Timeout { stage: "compile" }` leave the request queued,
/// so the next lookup retries it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Artifact missing at {path}")]
    ArtifactMissing { path: String },

    #[error("No document found for {identifier}")]
    BuildNotFound { identifier: String },

    #[error("Fetching {url} failed: {reason}")]
    FetchFailure { url: String, reason: String },

    #[error("Compiling {identifier} failed: {reason}")]
    CompileFailure { identifier: String, reason: String },

    #[error("{stage} timed out after {timeout_seconds} seconds")]
    Timeout { stage: String, timeout_seconds: u64 },

    #[error("Invalid identifier: {reason}")]
    InvalidIdentifier { reason: String },
}

impl BuildError {
    /// Whether a later attempt may succeed without a new submission.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CompileFailure { .. } => true,
            Self::Timeout { stage, .. } => stage == "compile",
            _ => false,
        }
    }
}

impl UserFriendlyError for BuildError {
    fn user_message(&self) -> String {
        match self {
            Self::ArtifactMissing { path } => {
                format!("The compiled artifact was not found at {path}")
            }
            Self::BuildNotFound { identifier } => {
                format!("No document named {identifier} is built or queued")
            }
            Self::FetchFailure { url, reason } => {
                format!("Could not fetch repository {url}: {reason}")
            }
            Self::CompileFailure { identifier, reason } => {
                format!("Document {identifier} failed to compile: {reason}")
            }
            Self::Timeout {
                stage,
                timeout_seconds,
            } => format!("The {stage} step did not finish within {timeout_seconds} seconds"),
            Self::InvalidIdentifier { reason } => format!("Invalid document identifier: {reason}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::BuildNotFound { .. } => Some(
                "Documents become available after a webhook submission or when found in the output directory at startup."
                    .to_string(),
            ),
            Self::CompileFailure { .. } => Some(
                "The request stays queued; the next lookup will retry the compilation.".to_string(),
            ),
            Self::Timeout { stage, .. } if stage == "compile" => Some(
                "The request stays queued; the next lookup will retry the compilation.".to_string(),
            ),
            Self::FetchFailure { .. } | Self::Timeout { .. } => Some(
                "No documents from this submission were queued or built.".to_string(),
            ),
            Self::ArtifactMissing { .. } | Self::InvalidIdentifier { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::BuildNotFound { .. } => vec![
                "Check the owner/repository/name spelling".to_string(),
                "Run 'intexration documents' to list known documents".to_string(),
            ],
            Self::FetchFailure { .. } => vec![
                "Verify the repository URL is reachable from the server".to_string(),
                "Check that the pushed ref exists".to_string(),
            ],
            Self::CompileFailure { .. } => {
                vec!["Build the document locally with latexmk to see the full log".to_string()]
            }
            Self::Timeout { .. } => vec![
                "Raise [compilation] fetch_timeout_secs / compile_timeout_secs".to_string(),
            ],
            Self::ArtifactMissing { .. } => {
                vec!["Check that the compiler writes <name>.pdf to its output directory".to_string()]
            }
            Self::InvalidIdentifier { .. } => vec![
                "Identifiers look like owner/repository/name with no path separators".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::BuildNotFound { .. } => ErrorCategory::Lookup,
            Self::FetchFailure { .. } => ErrorCategory::SourceControl,
            Self::CompileFailure { .. } | Self::Timeout { .. } => ErrorCategory::Compilation,
            Self::ArtifactMissing { .. } => ErrorCategory::FileSystem,
            Self::InvalidIdentifier { .. } => ErrorCategory::Validation,
        }
    }
}

// ============================================================================
// Webhook gateway and key store
// ============================================================================

/// Errors raised while accepting a webhook submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Unauthorized: API key invalid")]
    Unauthorized,

    #[error("Bad request: could not decode payload: {reason}")]
    MalformedPayload { reason: String },
}

impl WebhookError {
    /// HTTP status the transport answers with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::MalformedPayload { .. } => 400,
        }
    }
}

/// API key store errors.
#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("API key must be a single non-empty token")]
    InvalidKey,

    #[error("API key file {path} could not be accessed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("API key file not found in {dir}")]
    ImportMissing { dir: String },
}

impl UserFriendlyError for RunnerError {
    fn user_message(&self) -> String {
        match self {
            Self::SpawnFailed { program, .. } => format!("Could not start '{program}'"),
            Self::ExecutionFailed { reason } => format!("External tool failed: {reason}"),
            Self::Timeout { timeout_seconds } => {
                format!("External tool did not finish within {timeout_seconds} seconds")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::SpawnFailed { reason, .. } => Some(reason.clone()),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::SpawnFailed { .. } => {
                vec!["Check that the tool is installed and on PATH".to_string()]
            }
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Compilation
    }
}

impl UserFriendlyError for IntexrationError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Build(e) => e.user_message(),
            Self::Runner(e) => e.user_message(),
            Self::Webhook(e) => e.to_string(),
            Self::Keys(e) => e.to_string(),
            Self::Io(e) => format!("File system operation failed: {e}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Build(e) => e.context(),
            Self::Runner(e) => e.context(),
            Self::Webhook(WebhookError::Unauthorized) => Some(
                "Webhook URLs carry an API key registered with 'intexration keys add'.".to_string(),
            ),
            Self::Webhook(WebhookError::MalformedPayload { .. }) => Some(
                "The payload must contain repository.url, repository.name and after.".to_string(),
            ),
            Self::Keys(_) | Self::Io(_) => Some(
                "This usually indicates a permissions issue or disk space problem.".to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Build(e) => e.suggestions(),
            Self::Runner(e) => e.suggestions(),
            Self::Webhook(WebhookError::Unauthorized) => {
                vec!["Run 'intexration keys list' to see registered keys".to_string()]
            }
            Self::Webhook(_) | Self::Keys(_) | Self::Io(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(e) => e.category(),
            Self::Build(e) => e.category(),
            Self::Runner(e) => e.category(),
            Self::Webhook(WebhookError::Unauthorized) => ErrorCategory::Security,
            Self::Webhook(_) => ErrorCategory::Validation,
            Self::Keys(_) | Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl IntexrationError {
    /// Get a user-friendly error message with context and actionable suggestions.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }

    /// Map this error to the CLI exit code. Single source of truth for the table above.
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;

        match self {
            Self::Config(_) => ExitCode::CONFIG,
            Self::Build(build_err) => match build_err {
                BuildError::BuildNotFound { .. } => ExitCode::NOT_FOUND,
                BuildError::InvalidIdentifier { .. } => ExitCode::CONFIG,
                BuildError::FetchFailure { .. } => ExitCode::FETCH_FAILURE,
                BuildError::CompileFailure { .. } | BuildError::ArtifactMissing { .. } => {
                    ExitCode::COMPILE_FAILURE
                }
                BuildError::Timeout { .. } => ExitCode::TIMEOUT,
            },
            Self::Runner(RunnerError::Timeout { .. }) => ExitCode::TIMEOUT,
            Self::Runner(_) => ExitCode::INTERNAL,
            Self::Webhook(WebhookError::Unauthorized) => ExitCode::UNAUTHORIZED,
            Self::Webhook(WebhookError::MalformedPayload { .. }) => ExitCode::CONFIG,
            Self::Keys(_) | Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}
