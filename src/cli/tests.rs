use clap::Parser;
use std::path::PathBuf;

use super::args::{Cli, Commands, ConfigCommands, KeysCommands};
use super::run::{classify, cli_args_from};
use crate::{BuildError, ConfigError, ExitCode, WebhookError};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("intexration").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_mode_flags_default_to_config() {
    let cli = parse(&["documents"]);
    let args = cli_args_from(&cli);
    assert_eq!(args.lazy, None);
    assert_eq!(args.threaded, None);
    assert_eq!(args.config_path, None);
}

#[test]
fn test_mode_flags_override() {
    let args = cli_args_from(&parse(&["--eager", "--sequential", "documents"]));
    assert_eq!(args.lazy, Some(false));
    assert_eq!(args.threaded, Some(false));

    let args = cli_args_from(&parse(&["documents", "--lazy", "--threaded"]));
    assert_eq!(args.lazy, Some(true));
    assert_eq!(args.threaded, Some(true));

    // Last one wins
    let args = cli_args_from(&parse(&["--lazy", "--eager", "documents"]));
    assert_eq!(args.lazy, Some(false));
}

#[test]
fn test_global_overrides_flow_into_cli_args() {
    let cli = parse(&[
        "--config",
        "/etc/intexration.toml",
        "--output-dir",
        "/srv/pdf",
        "--max-workers",
        "3",
        "--port",
        "9000",
        "get",
        "acme/paper/main",
    ]);
    let args = cli_args_from(&cli);
    assert_eq!(args.config_path, Some(PathBuf::from("/etc/intexration.toml")));
    assert_eq!(args.output_dir, Some(PathBuf::from("/srv/pdf")));
    assert_eq!(args.max_workers, Some(3));
    assert_eq!(args.port, Some(9000));

    match cli.command {
        Commands::Get { identifier, json } => {
            assert_eq!(identifier, "acme/paper/main");
            assert!(!json);
        }
        other => panic!("Expected get, got {other:?}"),
    }
}

#[test]
fn test_submit_requires_key() {
    assert!(Cli::try_parse_from(["intexration", "submit"]).is_err());

    let cli = parse(&["submit", "--key", "s3cret", "--payload-file", "push.json"]);
    match cli.command {
        Commands::Submit {
            key, payload_file, ..
        } => {
            assert_eq!(key, "s3cret");
            assert_eq!(payload_file, Some(PathBuf::from("push.json")));
        }
        other => panic!("Expected submit, got {other:?}"),
    }
}

#[test]
fn test_nested_subcommands() {
    assert!(matches!(
        parse(&["keys", "list"]).command,
        Commands::Keys(KeysCommands::List)
    ));
    match parse(&["config", "set", "compilation.lazy", "true"]).command {
        Commands::Config(ConfigCommands::Set { key, value }) => {
            assert_eq!(key, "compilation.lazy");
            assert_eq!(value, "true");
        }
        other => panic!("Expected config set, got {other:?}"),
    }
}

#[test]
fn test_classify_recovers_typed_errors() {
    let err = anyhow::Error::from(BuildError::BuildNotFound {
        identifier: "acme/paper/main".to_string(),
    });
    assert_eq!(classify(err).unwrap().to_exit_code(), ExitCode::NOT_FOUND);

    let err = anyhow::Error::from(WebhookError::Unauthorized).context("handling webhook");
    assert_eq!(classify(err).unwrap().to_exit_code(), ExitCode::UNAUTHORIZED);

    let err = anyhow::Error::from(ConfigError::InvalidFile("bad".to_string()));
    assert_eq!(classify(err).unwrap().to_exit_code(), ExitCode::CONFIG);

    assert!(classify(anyhow::anyhow!("something else")).is_err());
}
