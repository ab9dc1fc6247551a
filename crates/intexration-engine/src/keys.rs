//! API keys accepted by the webhook gateway.
//!
//! Stored one key per line. The file is re-read on every check, so keys added
//! from another process take effect without a restart.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use intexration_utils::atomic_write::write_file_atomic;
use intexration_utils::error::KeyStoreError;

/// File name used by [`KeyStore::export_to`] and [`KeyStore::import_from`].
pub const KEY_FILE_NAME: &str = "api_keys.txt";

#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    /// A store backed by `path`. The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registered keys in file order. A missing file holds no keys.
    pub fn all(&self) -> Result<Vec<String>, KeyStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(parse_keys(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Whether `key` is registered. Unreadable stores reject everything.
    #[must_use]
    pub fn is_valid(&self, key: &str) -> bool {
        let key = key.trim();
        if key.is_empty() {
            return false;
        }
        match self.all() {
            Ok(keys) => keys.iter().any(|k| k == key),
            Err(e) => {
                tracing::error!(error = %e, "API key store unreadable; rejecting request");
                false
            }
        }
    }

    /// Register `key`. Returns `false` if it was already present.
    pub fn add(&self, key: &str) -> Result<bool, KeyStoreError> {
        let key = validate_key(key)?;
        let mut keys = self.all()?;
        if keys.iter().any(|k| k == key) {
            return Ok(false);
        }
        keys.push(key.to_string());
        self.write(&keys)?;
        tracing::info!(path = %self.path.display(), "API key added");
        Ok(true)
    }

    /// Remove `key`. Returns `false` if it was not registered.
    pub fn remove(&self, key: &str) -> Result<bool, KeyStoreError> {
        let key = key.trim();
        let mut keys = self.all()?;
        let before = keys.len();
        keys.retain(|k| k != key);
        if keys.len() == before {
            return Ok(false);
        }
        self.write(&keys)?;
        tracing::info!(path = %self.path.display(), "API key removed");
        Ok(true)
    }

    /// Copy the key file to `dir/api_keys.txt`.
    pub fn export_to(&self, dir: &Path) -> Result<PathBuf, KeyStoreError> {
        let target = dir.join(KEY_FILE_NAME);
        let keys = self.all()?;
        write_keys(&target, &keys)?;
        Ok(target)
    }

    /// Replace the store with the keys in `dir/api_keys.txt`.
    pub fn import_from(&self, dir: &Path) -> Result<usize, KeyStoreError> {
        let source = dir.join(KEY_FILE_NAME);
        let content = match fs::read_to_string(&source) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(KeyStoreError::ImportMissing {
                    dir: dir.display().to_string(),
                });
            }
            Err(e) => {
                return Err(KeyStoreError::Io {
                    path: source.display().to_string(),
                    source: e,
                });
            }
        };
        let keys = parse_keys(&content);
        self.write(&keys)?;
        Ok(keys.len())
    }

    fn write(&self, keys: &[String]) -> Result<(), KeyStoreError> {
        write_keys(&self.path, keys)
    }

    fn io_error(&self, source: io::Error) -> KeyStoreError {
        KeyStoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

fn parse_keys(content: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !keys.iter().any(|k| k == line) {
            keys.push(line.to_string());
        }
    }
    keys
}

fn validate_key(key: &str) -> Result<&str, KeyStoreError> {
    let key = key.trim();
    if key.is_empty() || key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(KeyStoreError::InvalidKey);
    }
    Ok(key)
}

fn write_keys(path: &Path, keys: &[String]) -> Result<(), KeyStoreError> {
    let mut content = keys.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    write_file_atomic(path, content.as_bytes()).map_err(|e| KeyStoreError::Io {
        path: path.display().to_string(),
        source: io::Error::other(format!("{e:#}")),
    })
}
