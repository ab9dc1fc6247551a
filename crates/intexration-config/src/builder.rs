use std::path::PathBuf;
use std::time::Duration;

use intexration_utils::error::ConfigError;

use super::{Config, ConfigSource};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding the engine (or in tests) where behavior must not
    /// depend on environment variables or config files.
    ///
    /// # Example
    ///
    /// ```rust
    /// use intexration_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .base_dir("/srv/intexration")
    ///     .lazy(true)
    ///     .max_workers(2)
    ///     .compile_timeout(Duration::from_secs(120))
    ///     .build()
    ///     .expect("valid configuration");
    /// assert!(config.compilation.lazy);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent construction of a [`Config`].
///
/// All values set via the builder are attributed to `ConfigSource::Programmatic`.
/// `build()` validates the result exactly like discovery does.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    base_dir: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    branch: Option<String>,
    lazy: Option<bool>,
    threaded: Option<bool>,
    explore: Option<bool>,
    max_workers: Option<usize>,
    fetch_timeout: Option<Duration>,
    compile_timeout: Option<Duration>,
    output_dir: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    api_keys: Option<PathBuf>,
    git: Option<String>,
    compiler: Option<String>,
    compiler_args: Option<Vec<String>>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory relative paths are resolved against. Defaults to the current directory.
    #[must_use]
    pub fn base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    #[must_use]
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = Some(lazy);
        self
    }

    #[must_use]
    pub fn threaded(mut self, threaded: bool) -> Self {
        self.threaded = Some(threaded);
        self
    }

    /// Whether the output directory is scanned when the orchestrator opens.
    #[must_use]
    pub fn explore(mut self, explore: bool) -> Self {
        self.explore = Some(explore);
        self
    }

    #[must_use]
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    /// Timeout for a single fetch. Sub-second precision is dropped.
    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Timeout for a single compile. Sub-second precision is dropped.
    #[must_use]
    pub fn compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn work_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn api_keys(mut self, path: impl Into<PathBuf>) -> Self {
        self.api_keys = Some(path.into());
        self
    }

    #[must_use]
    pub fn git(mut self, program: impl Into<String>) -> Self {
        self.git = Some(program.into());
        self
    }

    #[must_use]
    pub fn compiler(mut self, program: impl Into<String>) -> Self {
        self.compiler = Some(program.into());
        self
    }

    #[must_use]
    pub fn compiler_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compiler_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let base_dir = match self.base_dir {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
                reason: format!("Failed to get current directory: {e}"),
            })?,
        };
        let mut config = Config::defaults_at(base_dir);
        let mut touched: Vec<&'static str> = Vec::new();

        macro_rules! set {
            ($value:expr, $target:expr, $key:literal) => {
                if let Some(value) = $value {
                    $target = value;
                    touched.push($key);
                }
            };
        }

        set!(self.host, config.server.host, "server.host");
        set!(self.port, config.server.port, "server.port");
        set!(self.branch, config.compilation.branch, "compilation.branch");
        set!(self.lazy, config.compilation.lazy, "compilation.lazy");
        set!(self.threaded, config.compilation.threaded, "compilation.threaded");
        set!(self.explore, config.compilation.explore, "compilation.explore");
        set!(
            self.max_workers,
            config.compilation.max_workers,
            "compilation.max_workers"
        );
        set!(
            self.fetch_timeout.map(|d| d.as_secs()),
            config.compilation.fetch_timeout_secs,
            "compilation.fetch_timeout_secs"
        );
        set!(
            self.compile_timeout.map(|d| d.as_secs()),
            config.compilation.compile_timeout_secs,
            "compilation.compile_timeout_secs"
        );
        set!(self.output_dir, config.paths.output_dir, "paths.output_dir");
        set!(self.work_dir, config.paths.work_dir, "paths.work_dir");
        set!(self.api_keys, config.paths.api_keys, "paths.api_keys");
        set!(self.git, config.tools.git, "tools.git");
        set!(self.compiler, config.tools.compiler, "tools.compiler");
        set!(
            self.compiler_args,
            config.tools.compiler_args,
            "tools.compiler_args"
        );

        for key in touched {
            config.attribute(key, ConfigSource::Programmatic);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_attributes_programmatic() {
        let config = Config::builder()
            .base_dir("/srv")
            .lazy(true)
            .output_dir("/data/pdfs")
            .build()
            .unwrap();

        assert!(config.compilation.lazy);
        assert_eq!(config.output_dir(), PathBuf::from("/data/pdfs"));
        assert_eq!(
            config.source_attribution["compilation.lazy"],
            ConfigSource::Programmatic
        );
        assert_eq!(
            config.source_attribution["compilation.threaded"],
            ConfigSource::Default
        );
    }

    #[test]
    fn test_builder_validates() {
        let err = Config::builder()
            .base_dir("/srv")
            .compile_timeout(Duration::from_millis(500))
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "compilation.compile_timeout_secs"
        ));
    }
}
