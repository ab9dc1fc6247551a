//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Builds CliArgs and discovers Config
//! - Dispatches to command handlers
//! - Handles all error output

use clap::Parser;

use super::args::{Cli, Commands, ConfigCommands, KeysCommands};
use super::commands;

use crate::error::{KeyStoreError, RunnerError};
use crate::logging::init_tracing;
use crate::{BuildError, CliArgs, Config, ConfigError, ExitCode, IntexrationError, WebhookError};

/// Main CLI execution function.
///
/// Prints everything, including errors, and returns the exit code to use on failure.
/// main.rs only calls `std::process::exit(code.as_i32())`.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Warning: logging unavailable: {e}");
    }

    let cli_args = cli_args_from(&cli);

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = IntexrationError::from(err);
            eprint!("{}", err.display_for_user());
            return Err(err.to_exit_code());
        }
    };

    tracing::debug!(
        config_file = ?config.config_path,
        lazy = config.compilation.lazy,
        threaded = config.compilation.threaded,
        "Configuration loaded"
    );

    let result = match cli.command {
        Commands::Submit {
            key,
            payload_file,
            json,
        } => commands::execute_submit_command(&config, &key, payload_file.as_deref(), json),
        Commands::Get { identifier, json } => {
            commands::execute_get_command(&config, &identifier, json)
        }
        Commands::Documents { json } => commands::execute_documents_command(&config, json),
        Commands::Keys(keys_cmd) => match keys_cmd {
            KeysCommands::Add { key } => commands::execute_keys_add_command(&config, &key),
            KeysCommands::Remove { key } => commands::execute_keys_remove_command(&config, &key),
            KeysCommands::List => commands::execute_keys_list_command(&config),
            KeysCommands::Export { dir } => commands::execute_keys_export_command(&config, &dir),
            KeysCommands::Import { dir } => commands::execute_keys_import_command(&config, &dir),
        },
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show { json } => commands::execute_config_show_command(&config, json),
            ConfigCommands::Set { key, value } => {
                commands::execute_config_set_command(&config, &key, &value)
            }
            ConfigCommands::Export { dir } => {
                commands::execute_config_export_command(&config, &dir)
            }
            ConfigCommands::Import { dir } => {
                commands::execute_config_import_command(&config, &dir)
            }
        },
    };

    result.map_err(report_error)
}

pub(crate) fn cli_args_from(cli: &Cli) -> CliArgs {
    CliArgs {
        config_path: cli.config.clone(),
        host: cli.host.clone(),
        port: cli.port,
        lazy: cli.lazy_override(),
        threaded: cli.threaded_override(),
        max_workers: cli.max_workers,
        output_dir: cli.output_dir.clone(),
    }
}

/// Print a failed command's error and pick its exit code.
fn report_error(err: anyhow::Error) -> ExitCode {
    match classify(err) {
        Ok(err) => {
            eprint!("{}", err.display_for_user());
            err.to_exit_code()
        }
        Err(other) => {
            eprintln!("Error: {other:#}");
            ExitCode::INTERNAL
        }
    }
}

/// Recover the typed error behind an `anyhow::Error`, if there is one.
pub(crate) fn classify(err: anyhow::Error) -> Result<IntexrationError, anyhow::Error> {
    let err = match err.downcast::<IntexrationError>() {
        Ok(e) => return Ok(e),
        Err(err) => err,
    };
    let err = match err.downcast::<ConfigError>() {
        Ok(e) => return Ok(e.into()),
        Err(err) => err,
    };
    let err = match err.downcast::<BuildError>() {
        Ok(e) => return Ok(e.into()),
        Err(err) => err,
    };
    let err = match err.downcast::<WebhookError>() {
        Ok(e) => return Ok(e.into()),
        Err(err) => err,
    };
    let err = match err.downcast::<KeyStoreError>() {
        Ok(e) => return Ok(e.into()),
        Err(err) => err,
    };
    match err.downcast::<RunnerError>() {
        Ok(e) => Ok(e.into()),
        Err(err) => Err(err),
    }
}
