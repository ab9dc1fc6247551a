use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_COMPILE_TIMEOUT_SECS: u64 = 600;
/// Upper bound for `compilation.max_workers`.
pub const MAX_WORKERS_LIMIT: usize = 64;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Cli,
    ConfigFile(PathBuf),
    Programmatic,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::ConfigFile(_) => write!(f, "config"),
            Self::Programmatic => write!(f, "programmatic"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Configuration for the intexration service.
///
/// Built with precedence CLI > config file > built-in defaults by
/// [`Config::discover()`], or programmatically with [`Config::builder()`].
///
/// Relative paths in `[paths]` are resolved against [`Config::base_dir`]: the
/// directory holding `.intexration/` when a file was discovered, otherwise the
/// directory discovery started from.
///
/// # Example
///
/// ```rust,no_run
/// use intexration_config::{CliArgs, Config};
///
/// let config = Config::discover(&CliArgs::default())?;
/// println!("lazy: {}", config.compilation.lazy);
/// println!("output: {}", config.output_dir().display());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Configuration File Format
///
/// ```toml
/// [server]
/// host = "localhost"
/// port = 8000
///
/// [compilation]
/// branch = "master"
/// lazy = false
/// threaded = true
/// explore = true
/// max_workers = 4
/// fetch_timeout_secs = 300
/// compile_timeout_secs = 600
///
/// [paths]
/// output_dir = "out"
/// work_dir = "work"
/// api_keys = "api_keys.txt"
///
/// [tools]
/// git = "git"
/// compiler = "latexmk"
/// compiler_args = ["-pdf", "-interaction=nonstopmode", "-halt-on-error"]
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub compilation: CompilationConfig,
    pub paths: PathsConfig,
    pub tools: ToolsConfig,
    /// Directory relative paths are resolved against.
    pub base_dir: PathBuf,
    /// The config file that was loaded, if any.
    pub config_path: Option<PathBuf>,
    /// Source attribution for each setting, keyed by `section.key`.
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// Listen address handed to the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Scheduling policy for builds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CompilationConfig {
    /// Branch fetched for every submission.
    pub branch: String,
    /// Defer compilation until the first lookup.
    pub lazy: bool,
    /// Compile eager batches on the worker pool instead of one by one.
    pub threaded: bool,
    /// Scan the output directory at startup.
    pub explore: bool,
    pub max_workers: usize,
    pub fetch_timeout_secs: u64,
    pub compile_timeout_secs: u64,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            lazy: false,
            threaded: true,
            explore: true,
            max_workers: default_max_workers(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            compile_timeout_secs: DEFAULT_COMPILE_TIMEOUT_SECS,
        }
    }
}

/// Available parallelism, clamped to the accepted worker range.
#[must_use]
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .clamp(1, MAX_WORKERS_LIMIT)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Root of the `owner/repository/name.pdf` hierarchy.
    pub output_dir: PathBuf,
    /// Working copies and build directories.
    pub work_dir: PathBuf,
    /// API key file, one key per line.
    pub api_keys: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("out"),
            work_dir: PathBuf::from("work"),
            api_keys: PathBuf::from("api_keys.txt"),
        }
    }
}

/// External tool binaries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolsConfig {
    pub git: String,
    pub compiler: String,
    pub compiler_args: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            compiler: "latexmk".to_string(),
            compiler_args: vec![
                "-pdf".to_string(),
                "-interaction=nonstopmode".to_string(),
                "-halt-on-error".to_string(),
            ],
        }
    }
}

/// On-disk shape of `config.toml`. Every value is optional so a file can
/// override a single key.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlConfig {
    pub server: Option<TomlServer>,
    pub compilation: Option<TomlCompilation>,
    pub paths: Option<TomlPaths>,
    pub tools: Option<TomlTools>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlServer {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlCompilation {
    pub branch: Option<String>,
    pub lazy: Option<bool>,
    pub threaded: Option<bool>,
    pub explore: Option<bool>,
    pub max_workers: Option<usize>,
    pub fetch_timeout_secs: Option<u64>,
    pub compile_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlPaths {
    pub output_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub api_keys: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlTools {
    pub git: Option<String>,
    pub compiler: Option<String>,
    pub compiler_args: Option<Vec<String>>,
}

/// Every key the configuration understands, in display order.
pub const KNOWN_KEYS: &[&str] = &[
    "server.host",
    "server.port",
    "compilation.branch",
    "compilation.lazy",
    "compilation.threaded",
    "compilation.explore",
    "compilation.max_workers",
    "compilation.fetch_timeout_secs",
    "compilation.compile_timeout_secs",
    "paths.output_dir",
    "paths.work_dir",
    "paths.api_keys",
    "tools.git",
    "tools.compiler",
    "tools.compiler_args",
];

impl Config {
    /// Configuration with built-in defaults rooted at `base_dir`.
    #[must_use]
    pub fn defaults_at(base_dir: impl Into<PathBuf>) -> Self {
        let source_attribution = KNOWN_KEYS
            .iter()
            .map(|key| ((*key).to_string(), ConfigSource::Default))
            .collect();

        Self {
            server: ServerConfig::default(),
            compilation: CompilationConfig::default(),
            paths: PathsConfig::default(),
            tools: ToolsConfig::default(),
            base_dir: base_dir.into(),
            config_path: None,
            source_attribution,
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.paths.output_dir)
    }

    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.resolve(&self.paths.work_dir)
    }

    #[must_use]
    pub fn api_keys_path(&self) -> PathBuf {
        self.resolve(&self.paths.api_keys)
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.compilation.fetch_timeout_secs)
    }

    #[must_use]
    pub fn compile_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.compilation.compile_timeout_secs)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub(crate) fn attribute(&mut self, key: &str, source: ConfigSource) {
        self.source_attribution.insert(key.to_string(), source);
    }

    /// Apply the values present in a parsed file, attributing each one.
    pub(crate) fn apply_file(&mut self, file: TomlConfig, source: &ConfigSource) {
        let mut touched: Vec<&'static str> = Vec::new();

        macro_rules! take {
            ($section:expr, $field:ident, $target:expr, $key:literal) => {
                if let Some(value) = $section.$field {
                    $target = value;
                    touched.push($key);
                }
            };
        }

        if let Some(server) = file.server {
            take!(server, host, self.server.host, "server.host");
            take!(server, port, self.server.port, "server.port");
        }
        if let Some(c) = file.compilation {
            take!(c, branch, self.compilation.branch, "compilation.branch");
            take!(c, lazy, self.compilation.lazy, "compilation.lazy");
            take!(c, threaded, self.compilation.threaded, "compilation.threaded");
            take!(c, explore, self.compilation.explore, "compilation.explore");
            take!(c, max_workers, self.compilation.max_workers, "compilation.max_workers");
            take!(
                c,
                fetch_timeout_secs,
                self.compilation.fetch_timeout_secs,
                "compilation.fetch_timeout_secs"
            );
            take!(
                c,
                compile_timeout_secs,
                self.compilation.compile_timeout_secs,
                "compilation.compile_timeout_secs"
            );
        }
        if let Some(paths) = file.paths {
            take!(paths, output_dir, self.paths.output_dir, "paths.output_dir");
            take!(paths, work_dir, self.paths.work_dir, "paths.work_dir");
            take!(paths, api_keys, self.paths.api_keys, "paths.api_keys");
        }
        if let Some(tools) = file.tools {
            take!(tools, git, self.tools.git, "tools.git");
            take!(tools, compiler, self.tools.compiler, "tools.compiler");
            take!(tools, compiler_args, self.tools.compiler_args, "tools.compiler_args");
        }

        for key in touched {
            self.attribute(key, source.clone());
        }
    }

    /// The full effective configuration in file form.
    pub(crate) fn to_toml_config(&self) -> TomlConfig {
        TomlConfig {
            server: Some(TomlServer {
                host: Some(self.server.host.clone()),
                port: Some(self.server.port),
            }),
            compilation: Some(TomlCompilation {
                branch: Some(self.compilation.branch.clone()),
                lazy: Some(self.compilation.lazy),
                threaded: Some(self.compilation.threaded),
                explore: Some(self.compilation.explore),
                max_workers: Some(self.compilation.max_workers),
                fetch_timeout_secs: Some(self.compilation.fetch_timeout_secs),
                compile_timeout_secs: Some(self.compilation.compile_timeout_secs),
            }),
            paths: Some(TomlPaths {
                output_dir: Some(self.paths.output_dir.clone()),
                work_dir: Some(self.paths.work_dir.clone()),
                api_keys: Some(self.paths.api_keys.clone()),
            }),
            tools: Some(TomlTools {
                git: Some(self.tools.git.clone()),
                compiler: Some(self.tools.compiler.clone()),
                compiler_args: Some(self.tools.compiler_args.clone()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::defaults_at("/srv/intexration");
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.compilation.branch, "master");
        assert!(!config.compilation.lazy);
        assert!(config.compilation.threaded);
        assert!(config.compilation.explore);
        assert!(config.compilation.max_workers >= 1);
        assert_eq!(config.tools.compiler, "latexmk");
        assert_eq!(
            config.source_attribution.get("server.port"),
            Some(&ConfigSource::Default)
        );
    }

    #[test]
    fn test_relative_paths_resolve_against_base_dir() {
        let mut config = Config::defaults_at("/srv/intexration");
        assert_eq!(
            config.output_dir(),
            PathBuf::from("/srv/intexration/out")
        );

        config.paths.work_dir = PathBuf::from("/var/tmp/work");
        assert_eq!(config.work_dir(), PathBuf::from("/var/tmp/work"));
    }

    #[test]
    fn test_apply_file_only_touches_present_keys() {
        let mut config = Config::defaults_at("/srv");
        let file: TomlConfig = toml::from_str(
            r#"
[compilation]
lazy = true
"#,
        )
        .unwrap();
        let source = ConfigSource::ConfigFile(PathBuf::from("/srv/.intexration/config.toml"));

        config.apply_file(file, &source);

        assert!(config.compilation.lazy);
        assert!(config.compilation.threaded);
        assert_eq!(config.source_attribution["compilation.lazy"], source);
        assert_eq!(
            config.source_attribution["compilation.threaded"],
            ConfigSource::Default
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let parsed: Result<TomlConfig, _> = toml::from_str("[server]\nhots = \"x\"\n");
        assert!(parsed.is_err());
    }
}
