//! Configuration builder for layered configuration loading

use crate::{Config, ConfigError, ConfigResult};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration builder for loading configuration from multiple sources
#[derive(Debug)]
pub struct ConfigBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<ConfigSource>,
    env_separator: String,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    File { path: PathBuf, format: FileFormat },
    Defaults,
    Environment { prefix: String },
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
            env_separator: "__".to_string(),
        }
    }

    /// Add default configuration values
    pub fn add_defaults(mut self) -> Self {
        self.sources.push(ConfigSource::Defaults);
        self
    }

    /// Add a configuration file source; missing files are skipped
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = Self::detect_format(&path);
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Build the configuration
    pub fn build(mut self) -> ConfigResult<Config> {
        // Defaults are always the base layer
        let defaults_value = serde_yaml::to_value(Config::default())
            .map_err(|e| ConfigError::other(format!("Failed to serialize defaults: {}", e)))?;
        let defaults_yaml = serde_yaml::to_string(&defaults_value)?;
        self.inner = self
            .inner
            .add_source(File::from_str(&defaults_yaml, FileFormat::Yaml));

        for source in &self.sources {
            match source {
                ConfigSource::File { path, format } => {
                    if path.exists() {
                        self.inner = self
                            .inner
                            .add_source(File::from(path.clone()).format(*format));
                    }
                }
                ConfigSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix)
                            .separator(&self.env_separator)
                            .try_parsing(true),
                    );
                }
                ConfigSource::Defaults => {}
            }
        }

        let config = self.inner.build()?;
        let result: Config = config.try_deserialize()?;

        Self::validate(&result)?;

        Ok(result)
    }

    /// Try to build the configuration, returning defaults on error
    pub fn build_or_default(self) -> Config {
        self.build().unwrap_or_default()
    }

    /// Detect file format from extension
    fn detect_format(path: &Path) -> FileFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }

    /// Validate the configuration
    pub(crate) fn validate(config: &Config) -> ConfigResult<()> {
        if config.progress.interval_secs == 0 {
            return Err(ConfigError::validation(
                "Progress interval must be greater than 0",
            ));
        }

        if config.progress.copy_progress_interval_millis == 0 {
            return Err(ConfigError::validation(
                "Copy progress interval must be greater than 0",
            ));
        }

        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }

        if config.statistics.enabled && config.statistics.file.as_os_str().is_empty() {
            return Err(ConfigError::validation(
                "Statistics file must be set when statistics are enabled",
            ));
        }

        Ok(())
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
