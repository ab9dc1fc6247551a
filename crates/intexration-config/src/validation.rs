use intexration_utils::error::ConfigError;

use super::{Config, MAX_WORKERS_LIMIT};

const MIN_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 7200;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values. The first violation wins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(invalid("server.host", "must not be empty"));
        }
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be greater than 0"));
        }

        if self.compilation.branch.trim().is_empty() {
            return Err(invalid("compilation.branch", "must not be empty"));
        }
        if self.compilation.max_workers == 0 {
            return Err(invalid("compilation.max_workers", "must be greater than 0"));
        }
        if self.compilation.max_workers > MAX_WORKERS_LIMIT {
            return Err(invalid(
                "compilation.max_workers",
                format!("exceeds maximum limit of {MAX_WORKERS_LIMIT}"),
            ));
        }

        for (key, secs) in [
            (
                "compilation.fetch_timeout_secs",
                self.compilation.fetch_timeout_secs,
            ),
            (
                "compilation.compile_timeout_secs",
                self.compilation.compile_timeout_secs,
            ),
        ] {
            if secs < MIN_TIMEOUT_SECS {
                return Err(invalid(
                    key,
                    format!("must be at least {MIN_TIMEOUT_SECS} seconds"),
                ));
            }
            if secs > MAX_TIMEOUT_SECS {
                return Err(invalid(
                    key,
                    format!("exceeds maximum limit of {MAX_TIMEOUT_SECS} seconds (2 hours)"),
                ));
            }
        }

        for (key, path) in [
            ("paths.output_dir", &self.paths.output_dir),
            ("paths.work_dir", &self.paths.work_dir),
            ("paths.api_keys", &self.paths.api_keys),
        ] {
            if path.as_os_str().is_empty() {
                return Err(invalid(key, "must not be empty"));
            }
        }

        if self.tools.git.trim().is_empty() {
            return Err(invalid("tools.git", "must not be empty"));
        }
        if self.tools.compiler.trim().is_empty() {
            return Err(invalid("tools.compiler", "must not be empty"));
        }

        Ok(())
    }
}
