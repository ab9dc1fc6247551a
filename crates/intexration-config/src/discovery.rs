use std::env;
use std::path::{Path, PathBuf};

use intexration_utils::error::ConfigError;

use super::{CliArgs, Config, ConfigSource, TomlConfig};

/// Directory searched for during discovery.
pub const CONFIG_DIR_NAME: &str = ".intexration";
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Environment variable naming a directory that holds `config.toml`.
pub const HOME_ENV_VAR: &str = "INTEXRATION_HOME";

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no explicit
    /// path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("Failed to get current directory: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// File lookup order: `cli_args.config_path`, then `$INTEXRATION_HOME/config.toml`,
    /// then an upward search for `.intexration/config.toml` from `start_dir`.
    /// An explicit path that does not exist is a [`ConfigError::MissingResource`];
    /// finding no file at all just means defaults.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.is_file() {
                    return Err(ConfigError::MissingResource {
                        resource: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => match home_config_file() {
                Some(path) => Some(path),
                None => Self::discover_config_file_from(start_dir),
            },
        };

        let mut config = Self::defaults_at(start_dir);

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)?;
            config.apply_file(file_config, &ConfigSource::ConfigFile(path.clone()));
            config.base_dir = base_dir_for(path, start_dir);
            config.config_path = Some(path.clone());
            tracing::debug!(path = %path.display(), "Loaded configuration file");
        }

        cli_args.apply(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Walk up from `start_dir` looking for `.intexration/config.toml`, stopping
    /// at repository root markers (.git, .hg, .svn) or the filesystem root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current_dir = Some(start_dir);

        while let Some(dir) = current_dir {
            let config_path = dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                return Some(config_path);
            }

            if dir.join(".git").exists() || dir.join(".hg").exists() || dir.join(".svn").exists()
            {
                break;
            }

            current_dir = dir.parent();
        }

        None
    }

    pub(crate) fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFile(
            format!("Failed to read {}: {e}", path.display()),
        ))?;
        toml::from_str(&content).map_err(|e| {
            ConfigError::InvalidFile(format!("Failed to parse {}: {e}", path.display()))
        })
    }
}

fn home_config_file() -> Option<PathBuf> {
    let home = env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty())?;
    let path = PathBuf::from(home).join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}

/// `<base>/.intexration/config.toml` resolves paths against `<base>`; any other
/// file resolves them against its own directory.
fn base_dir_for(config_path: &Path, fallback: &Path) -> PathBuf {
    let Some(dir) = config_path.parent() else {
        return fallback.to_path_buf();
    };
    if dir.file_name().is_some_and(|name| name == CONFIG_DIR_NAME) {
        dir.parent().unwrap_or(dir).to_path_buf()
    } else if dir.as_os_str().is_empty() {
        fallback.to_path_buf()
    } else {
        dir.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(root: &Path, content: &str) -> PathBuf {
        let dir = root.join(CONFIG_DIR_NAME);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    #[serial]
    fn test_upward_search_finds_parent_config() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "[compilation]\nlazy = true\n");
        let nested = temp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(Config::discover_config_file_from(&nested), Some(path));
    }

    #[test]
    fn test_upward_search_stops_at_repository_root() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[compilation]\nlazy = true\n");
        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();

        assert_eq!(Config::discover_config_file_from(&repo), None);
    }

    #[test]
    #[serial]
    fn test_file_values_override_defaults_and_set_base_dir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        write_config(
            temp.path(),
            r#"
[server]
port = 9000

[compilation]
lazy = true
threaded = false
"#,
        );

        let config = Config::discover_from(temp.path(), &CliArgs::default()).unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(config.compilation.lazy);
        assert!(!config.compilation.threaded);
        assert_eq!(config.base_dir, temp.path());
        assert_eq!(config.output_dir(), temp.path().join("out"));
        assert!(matches!(
            config.source_attribution["server.port"],
            ConfigSource::ConfigFile(_)
        ));
    }

    #[test]
    #[serial]
    fn test_cli_overrides_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        write_config(temp.path(), "[compilation]\nlazy = true\n");

        let cli_args = CliArgs {
            lazy: Some(false),
            ..Default::default()
        };
        let config = Config::discover_from(temp.path(), &cli_args).unwrap();

        assert!(!config.compilation.lazy);
        assert_eq!(
            config.source_attribution["compilation.lazy"],
            ConfigSource::Cli
        );
    }

    #[test]
    fn test_explicit_missing_config_is_missing_resource() {
        let temp = TempDir::new().unwrap();
        let cli_args = CliArgs {
            config_path: Some(temp.path().join("nope.toml")),
            ..Default::default()
        };

        let err = Config::discover_from(temp.path(), &cli_args).unwrap_err();
        assert!(matches!(err, ConfigError::MissingResource { .. }));
    }

    #[test]
    fn test_explicit_config_resolves_paths_beside_it() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        fs::write(&path, "[paths]\noutput_dir = \"pdfs\"\n").unwrap();

        let cli_args = CliArgs {
            config_path: Some(path.clone()),
            ..Default::default()
        };
        let config = Config::discover_from(Path::new("/"), &cli_args).unwrap();

        assert_eq!(config.config_path, Some(path));
        assert_eq!(config.output_dir(), temp.path().join("pdfs"));
    }

    #[test]
    #[serial]
    fn test_invalid_toml_is_invalid_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        write_config(temp.path(), "[server\nport = ");

        let err = Config::discover_from(temp.path(), &CliArgs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile(_)));
    }

    #[test]
    #[serial]
    fn test_home_env_var_takes_precedence_over_upward_search() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        write_config(temp.path(), "[server]\nport = 9001\n");

        let home = TempDir::new().unwrap();
        fs::write(home.path().join(CONFIG_FILE_NAME), "[server]\nport = 9002\n").unwrap();

        // SAFETY: serialized with every other test that reads the variable.
        unsafe { env::set_var(HOME_ENV_VAR, home.path()) };
        let result = Config::discover_from(temp.path(), &CliArgs::default());
        unsafe { env::remove_var(HOME_ENV_VAR) };

        let config = result.unwrap();
        assert_eq!(config.server.port, 9002);
        assert_eq!(config.base_dir, home.path());
    }
}
