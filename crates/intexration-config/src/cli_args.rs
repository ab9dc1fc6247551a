use std::path::PathBuf;

use super::{Config, ConfigSource};

/// Command-line overrides. `None` leaves the file or default value in place.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub lazy: Option<bool>,
    pub threaded: Option<bool>,
    pub max_workers: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

impl CliArgs {
    pub(crate) fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
            config.attribute("server.host", ConfigSource::Cli);
        }
        if let Some(port) = self.port {
            config.server.port = port;
            config.attribute("server.port", ConfigSource::Cli);
        }
        if let Some(lazy) = self.lazy {
            config.compilation.lazy = lazy;
            config.attribute("compilation.lazy", ConfigSource::Cli);
        }
        if let Some(threaded) = self.threaded {
            config.compilation.threaded = threaded;
            config.attribute("compilation.threaded", ConfigSource::Cli);
        }
        if let Some(max_workers) = self.max_workers {
            config.compilation.max_workers = max_workers;
            config.attribute("compilation.max_workers", ConfigSource::Cli);
        }
        if let Some(output_dir) = &self.output_dir {
            config.paths.output_dir = output_dir.clone();
            config.attribute("paths.output_dir", ConfigSource::Cli);
        }
    }
}
