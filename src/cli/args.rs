//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and all subcommand enums.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// intexration - continuous compilation of LaTeX documents from repository pushes
#[derive(Parser, Debug)]
#[command(name = "intexration")]
#[command(about = "Compile LaTeX documents from repository push webhooks")]
#[command(long_about = r#"
intexration receives push notifications for LaTeX repositories, fetches the pushed
ref, compiles every document it finds and serves the resulting PDFs by
owner/repository/name.

EXAMPLES:
  # Register an API key for webhook callers
  intexration keys add s3cret

  # Submit a push payload read from a file
  intexration submit --key s3cret --payload-file push.json

  # Submit a payload from stdin and compile right away
  cat push.json | intexration --eager submit --key s3cret

  # Locate a compiled document
  intexration get acme/paper/main

  # List every document in the output directory
  intexration documents --json

  # Show the effective configuration and where each value came from
  intexration config show

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > config file > defaults
  The config file is $INTEXRATION_HOME/config.toml when that variable is set,
  otherwise the first .intexration/config.toml found searching upward from CWD.
  Use --config to specify an explicit config file path
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Queue builds and compile them on first lookup
    #[arg(long, global = true, overrides_with = "eager")]
    pub lazy: bool,

    /// Compile builds as soon as they are submitted
    #[arg(long, global = true, overrides_with = "lazy")]
    pub eager: bool,

    /// Compile eager batches on a bounded worker pool
    #[arg(long, global = true, overrides_with = "sequential")]
    pub threaded: bool,

    /// Compile eager batches one at a time
    #[arg(long, global = true, overrides_with = "threaded")]
    pub sequential: bool,

    /// Upper bound on concurrent compilations (1-64)
    #[arg(long, global = true)]
    pub max_workers: Option<usize>,

    /// Directory holding compiled documents as owner/repository/name.pdf
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Address the webhook endpoint binds to
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port the webhook endpoint binds to
    #[arg(long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// `Some(true)` / `Some(false)` when one of a `--x` / `--no-x` style pair was given.
    pub(crate) fn lazy_override(&self) -> Option<bool> {
        flag_pair(self.lazy, self.eager)
    }

    pub(crate) fn threaded_override(&self) -> Option<bool> {
        flag_pair(self.threaded, self.sequential)
    }
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    if on {
        Some(true)
    } else if off {
        Some(false)
    } else {
        None
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a push payload as the webhook endpoint would
    ///
    /// The payload is the JSON body a repository host sends on push; only
    /// repository.url, repository.name and after are read.
    ///
    /// EXAMPLES:
    ///   intexration submit --key s3cret --payload-file push.json
    ///   cat push.json | intexration submit --key s3cret
    Submit {
        /// API key the caller presents
        #[arg(long)]
        key: String,

        /// Read the payload from this file instead of stdin
        #[arg(long)]
        payload_file: Option<PathBuf>,

        /// Output the batch summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a document, compiling it first if it is queued
    ///
    /// EXAMPLES:
    ///   intexration get acme/paper/main
    Get {
        /// Document identifier as owner/repository/name
        identifier: String,

        /// Output the document as JSON
        #[arg(long)]
        json: bool,
    },

    /// List compiled documents
    ///
    /// EXAMPLES:
    ///   intexration documents
    ///   intexration documents --json
    Documents {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage webhook API keys
    #[command(subcommand)]
    Keys(KeysCommands),

    /// Inspect and edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// API key subcommands
#[derive(Subcommand, Debug)]
pub enum KeysCommands {
    /// Register a key
    Add { key: String },

    /// Revoke a key
    Remove { key: String },

    /// Print every registered key
    List,

    /// Copy the key file into a directory
    Export { dir: PathBuf },

    /// Replace the key file with one from a directory
    Import { dir: PathBuf },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration with the source of each value
    ///
    /// EXAMPLES:
    ///   intexration config show
    ///   intexration --lazy config show --json
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set a value in the configuration file
    ///
    /// EXAMPLES:
    ///   intexration config set compilation.lazy true
    ///   intexration config set tools.compiler_args "-pdf -interaction=nonstopmode"
    Set {
        /// Key as section.name
        key: String,
        value: String,
    },

    /// Write the effective configuration to <dir>/config.toml
    Export { dir: PathBuf },

    /// Replace the configuration file with <dir>/config.toml
    Import { dir: PathBuf },
}
