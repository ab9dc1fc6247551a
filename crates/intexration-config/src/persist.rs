//! Editing, exporting and importing the settings file.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use intexration_utils::atomic_write::write_file_atomic;
use intexration_utils::error::ConfigError;

use super::{CONFIG_FILE_NAME, Config, ConfigSource, KNOWN_KEYS, TomlConfig};

#[derive(Clone, Copy)]
enum ValueKind {
    Text,
    Integer,
    Boolean,
    List,
}

fn kind_of(key: &str) -> Option<ValueKind> {
    let kind = match key {
        "server.port"
        | "compilation.max_workers"
        | "compilation.fetch_timeout_secs"
        | "compilation.compile_timeout_secs" => ValueKind::Integer,
        "compilation.lazy" | "compilation.threaded" | "compilation.explore" => ValueKind::Boolean,
        "tools.compiler_args" => ValueKind::List,
        k if KNOWN_KEYS.contains(&k) => ValueKind::Text,
        _ => return None,
    };
    Some(kind)
}

/// Accepts the usual spellings: true/false, yes/no, on/off, 1/0.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn to_toml_value(key: &str, raw: &str) -> Result<toml::Value, ConfigError> {
    let kind = kind_of(key).ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_string(),
        value: "unknown configuration key".to_string(),
    })?;
    let bad = |what: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        value: format!("'{raw}' is not {what}"),
    };

    Ok(match kind {
        ValueKind::Text => toml::Value::String(raw.to_string()),
        ValueKind::Integer => toml::Value::Integer(
            raw.trim()
                .parse::<i64>()
                .map_err(|_| bad("an integer"))?,
        ),
        ValueKind::Boolean => toml::Value::Boolean(parse_bool(raw).ok_or_else(|| bad("a boolean"))?),
        ValueKind::List => toml::Value::Array(
            raw.split_whitespace()
                .map(|arg| toml::Value::String(arg.to_string()))
                .collect(),
        ),
    })
}

/// Parse, apply and validate file content without touching the disk.
fn check_content(content: &str, origin: &Path) -> Result<(), ConfigError> {
    let parsed: TomlConfig = toml::from_str(content).map_err(|e| {
        ConfigError::InvalidFile(format!("Failed to parse {}: {e}", origin.display()))
    })?;
    let mut config = Config::defaults_at(origin.parent().unwrap_or(origin));
    config.apply_file(parsed, &ConfigSource::ConfigFile(origin.to_path_buf()));
    config.validate()
}

impl Config {
    /// Set `section.key` to `raw` in the settings file at `path`, creating it if needed.
    ///
    /// The value is typed from the key, the whole file is re-validated and then
    /// replaced atomically. Nothing is written when validation fails.
    pub fn set_value(path: &Path, key: &str, raw: &str) -> Result<()> {
        let Some((section, field)) = key.split_once('.') else {
            bail!(ConfigError::InvalidValue {
                key: key.to_string(),
                value: "expected <section>.<key>".to_string(),
            });
        };
        let value = to_toml_value(key, raw)?;

        let mut table: toml::Table = if path.is_file() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&content).map_err(|e| {
                ConfigError::InvalidFile(format!("Failed to parse {}: {e}", path.display()))
            })?
        } else {
            toml::Table::new()
        };

        let section_table = table
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let Some(section_table) = section_table.as_table_mut() else {
            bail!(ConfigError::InvalidFile(format!(
                "[{section}] in {} is not a table",
                path.display()
            )));
        };
        section_table.insert(field.to_string(), value);

        let content = toml::to_string(&table).context("Failed to serialize configuration")?;
        check_content(&content, path)?;

        write_file_atomic(path, content.as_bytes())?;
        tracing::info!(key = %key, path = %path.display(), "Configuration updated");
        Ok(())
    }

    /// Write the effective configuration to `dir/config.toml` and return that path.
    pub fn export_to(&self, dir: &Path) -> Result<PathBuf> {
        let target = dir.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(&self.to_toml_config())
            .context("Failed to serialize configuration")?;
        write_file_atomic(&target, content.as_bytes())?;
        Ok(target)
    }

    /// Replace the settings file at `target` with `dir/config.toml`.
    ///
    /// The imported file must parse and validate; otherwise `target` is left untouched.
    pub fn import_from(dir: &Path, target: &Path) -> Result<()> {
        let source = dir.join(CONFIG_FILE_NAME);
        if !source.is_file() {
            bail!(ConfigError::NotFound {
                path: source.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(&source)
            .with_context(|| format!("Failed to read {}", source.display()))?;
        check_content(&content, &source)?;

        write_file_atomic(target, content.as_bytes())?;
        tracing::info!(from = %source.display(), to = %target.display(), "Configuration imported");
        Ok(())
    }
}
