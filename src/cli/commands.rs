//! CLI command implementations.

use anyhow::{Context, Result};
use serde_json::json;
use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};

use intexration_config::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, HOME_ENV_VAR};

use crate::{
    BatchSummary, Config, Identifier, IntexrationError, KeyStore, Orchestrator, WebhookGateway,
};

/// Execute `intexration submit`.
///
/// Eager batches are compiled before this returns. Lazy batches are only queued, which
/// in a one-shot process means they are reported and then dropped.
pub fn execute_submit_command(
    config: &Config,
    key: &str,
    payload_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let payload = match payload_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read payload from stdin")?;
            buf
        }
    };

    let keys = key_store(config);
    // Tool probing only matters once the caller is authorized.
    if keys.is_valid(key) {
        config.probe_tools()?;
    }

    let orchestrator = Orchestrator::from_config(config)?;
    let summary = WebhookGateway::new(&orchestrator, &keys).handle(key, &payload)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&summary))?);
    } else {
        print!("{summary}");
    }

    match summary.failed.into_iter().next() {
        Some((_, error)) => Err(IntexrationError::Build(error).into()),
        None => Ok(()),
    }
}

/// Execute `intexration get <owner/repository/name>`.
pub fn execute_get_command(config: &Config, identifier: &str, json: bool) -> Result<()> {
    let identifier = Identifier::parse(identifier)?;
    let orchestrator = Orchestrator::from_config(config)?;
    let document = orchestrator.get_document(&identifier)?;

    if json {
        let value = json!({
            "identifier": identifier.to_string(),
            "path": document.artifact_path(),
            "modified": document.modified(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", document.artifact_path().display());
    }
    Ok(())
}

/// Execute `intexration documents`.
pub fn execute_documents_command(config: &Config, json: bool) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    let documents = orchestrator.documents();

    if json {
        let entries: Vec<_> = documents
            .iter()
            .map(|(id, doc)| {
                json!({
                    "identifier": id.to_string(),
                    "path": doc.artifact_path(),
                    "modified": doc.modified(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if documents.is_empty() {
        println!("No documents found in {}", config.output_dir().display());
        return Ok(());
    }
    for (id, doc) in &documents {
        println!("{id}  {}", doc.artifact_path().display());
    }
    Ok(())
}

fn key_store(config: &Config) -> KeyStore {
    KeyStore::new(config.api_keys_path())
}

pub fn execute_keys_add_command(config: &Config, key: &str) -> Result<()> {
    if key_store(config).add(key)? {
        println!("✓ Key added");
    } else {
        println!("Key already registered");
    }
    Ok(())
}

pub fn execute_keys_remove_command(config: &Config, key: &str) -> Result<()> {
    if key_store(config).remove(key)? {
        println!("✓ Key removed");
    } else {
        println!("Key was not registered");
    }
    Ok(())
}

pub fn execute_keys_list_command(config: &Config) -> Result<()> {
    for key in key_store(config).all()? {
        println!("{key}");
    }
    Ok(())
}

pub fn execute_keys_export_command(config: &Config, dir: &Path) -> Result<()> {
    let target = key_store(config).export_to(dir)?;
    println!("✓ Keys exported to {}", target.display());
    Ok(())
}

pub fn execute_keys_import_command(config: &Config, dir: &Path) -> Result<()> {
    let count = key_store(config).import_from(dir)?;
    println!("✓ Imported {count} key(s)");
    Ok(())
}

/// Execute `intexration config show`.
pub fn execute_config_show_command(config: &Config, json: bool) -> Result<()> {
    let effective = config.effective_config();

    if json {
        let values: serde_json::Map<String, serde_json::Value> = effective
            .into_iter()
            .map(|(key, (value, source))| (key, json!({ "value": value, "source": source })))
            .collect();
        let value = json!({
            "config_file": config.config_path,
            "values": values,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match &config.config_path {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }
    let width = effective.keys().map(String::len).max().unwrap_or(0);
    for (key, (value, source)) in &effective {
        println!("  {key:<width$} = {value}  ({source})");
    }
    Ok(())
}

pub fn execute_config_set_command(config: &Config, key: &str, value: &str) -> Result<()> {
    let target = config_target(config)?;
    Config::set_value(&target, key, value)?;
    println!("✓ Set {key} = {value} in {}", target.display());
    Ok(())
}

pub fn execute_config_export_command(config: &Config, dir: &Path) -> Result<()> {
    let target = config.export_to(dir)?;
    println!("✓ Configuration exported to {}", target.display());
    Ok(())
}

pub fn execute_config_import_command(config: &Config, dir: &Path) -> Result<()> {
    let target = config_target(config)?;
    Config::import_from(dir, &target)?;
    println!("✓ Configuration imported into {}", target.display());
    Ok(())
}

/// The file that `config set` and `config import` write.
///
/// The loaded file if there is one, else `$INTEXRATION_HOME/config.toml`, else
/// `.intexration/config.toml` in the current directory.
fn config_target(config: &Config) -> Result<PathBuf> {
    if let Some(path) = &config.config_path {
        return Ok(path.clone());
    }
    if let Some(home) = env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home).join(CONFIG_FILE_NAME));
    }
    let cwd = env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn summary_json(summary: &BatchSummary) -> serde_json::Value {
    let ids = |ids: &[Identifier]| ids.iter().map(ToString::to_string).collect::<Vec<_>>();
    let failed: Vec<_> = summary
        .failed
        .iter()
        .map(|(id, error)| json!({ "identifier": id.to_string(), "error": error.to_string() }))
        .collect();
    json!({
        "compiled": ids(&summary.compiled),
        "queued": ids(&summary.queued),
        "superseded": ids(&summary.superseded),
        "failed": failed,
    })
}
