use std::collections::BTreeMap;

use super::{Config, ConfigSource, KNOWN_KEYS};

impl Config {
    /// Effective configuration as `key -> (value, source)`, sorted by key.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        KNOWN_KEYS
            .iter()
            .filter_map(|key| {
                let value = self.value_of(key)?;
                let source = self
                    .source_attribution
                    .get(*key)
                    .unwrap_or(&ConfigSource::Default)
                    .to_string();
                Some(((*key).to_string(), (value, source)))
            })
            .collect()
    }

    /// Display form of a single `section.key` value.
    #[must_use]
    pub fn value_of(&self, key: &str) -> Option<String> {
        let value = match key {
            "server.host" => self.server.host.clone(),
            "server.port" => self.server.port.to_string(),
            "compilation.branch" => self.compilation.branch.clone(),
            "compilation.lazy" => self.compilation.lazy.to_string(),
            "compilation.threaded" => self.compilation.threaded.to_string(),
            "compilation.explore" => self.compilation.explore.to_string(),
            "compilation.max_workers" => self.compilation.max_workers.to_string(),
            "compilation.fetch_timeout_secs" => self.compilation.fetch_timeout_secs.to_string(),
            "compilation.compile_timeout_secs" => {
                self.compilation.compile_timeout_secs.to_string()
            }
            "paths.output_dir" => self.paths.output_dir.display().to_string(),
            "paths.work_dir" => self.paths.work_dir.display().to_string(),
            "paths.api_keys" => self.paths.api_keys.display().to_string(),
            "tools.git" => self.tools.git.clone(),
            "tools.compiler" => self.tools.compiler.clone(),
            "tools.compiler_args" => self.tools.compiler_args.join(" "),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_config_lists_every_key_with_source() {
        let mut config = Config::defaults_at("/srv");
        config.compilation.lazy = true;
        config.attribute("compilation.lazy", ConfigSource::Cli);

        let effective = config.effective_config();

        assert_eq!(effective.len(), KNOWN_KEYS.len());
        assert_eq!(
            effective["compilation.lazy"],
            ("true".to_string(), "cli".to_string())
        );
        assert_eq!(
            effective["server.port"],
            ("8000".to_string(), "default".to_string())
        );
    }

    #[test]
    fn test_unknown_key_has_no_value() {
        assert_eq!(Config::defaults_at("/srv").value_of("server.nope"), None);
    }
}
