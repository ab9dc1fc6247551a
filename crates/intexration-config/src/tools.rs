use std::path::PathBuf;

use intexration_utils::error::ConfigError;

use super::Config;

/// Resolved locations of the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub git: PathBuf,
    pub compiler: PathBuf,
}

impl Config {
    /// Resolve the configured git and compiler binaries on `PATH`.
    ///
    /// Run once at startup; a missing binary is a [`ConfigError::MissingResource`].
    pub fn probe_tools(&self) -> Result<ToolPaths, ConfigError> {
        let find = |program: &str| {
            which::which(program).map_err(|e| {
                tracing::error!(tool = %program, error = %e, "Required tool not found");
                ConfigError::MissingResource {
                    resource: program.to_string(),
                }
            })
        };

        Ok(ToolPaths {
            git: find(&self.tools.git)?,
            compiler: find(&self.tools.compiler)?,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_is_missing_resource() {
        let mut config = Config::defaults_at("/srv");
        config.tools.git = "sh".to_string();
        config.tools.compiler = "definitely-not-a-latex-compiler-12345".to_string();

        match config.probe_tools() {
            Err(ConfigError::MissingResource { resource }) => {
                assert_eq!(resource, "definitely-not-a-latex-compiler-12345");
            }
            other => panic!("Expected MissingResource, got {other:?}"),
        }
    }

    #[test]
    fn test_present_tools_resolve() {
        let mut config = Config::defaults_at("/srv");
        config.tools.git = "sh".to_string();
        config.tools.compiler = "sh".to_string();

        let paths = config.probe_tools().unwrap();
        assert!(paths.git.is_absolute());
    }
}
