//! Configuration loader utilities

use crate::{Config, ConfigBuilder, ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `TREESYNC__POLICY__DELETE_STALE=true`
pub const ENV_PREFIX: &str = "TREESYNC";

/// Configuration loader with common loading patterns
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the first file found in the default locations
    pub fn load_default() -> ConfigResult<Config> {
        let mut builder = ConfigBuilder::new().add_defaults();

        if let Some(path) = Self::config_exists() {
            builder = builder.add_source_file(path);
        }

        builder.add_env_prefix(ENV_PREFIX).build()
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Configuration file not found",
                ),
            });
        }

        ConfigBuilder::new()
            .add_defaults()
            .add_source_file(path)
            .add_env_prefix(ENV_PREFIX)
            .build()
    }

    /// Save configuration to a file, format chosen by extension
    pub fn save_to_file<P: AsRef<Path>>(config: &Config, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => {
                toml::to_string_pretty(config).map_err(|e| ConfigError::Serialization {
                    message: format!("Failed to serialize to TOML: {}", e),
                })?
            }
            Some("json") => {
                serde_json::to_string_pretty(config).map_err(|e| ConfigError::Serialization {
                    message: format!("Failed to serialize to JSON: {}", e),
                })?
            }
            _ => serde_yaml::to_string(config).map_err(|e| ConfigError::Serialization {
                message: format!("Failed to serialize to YAML: {}", e),
            })?,
        };

        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a default configuration file
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
        Self::save_to_file(&Config::default(), path)
    }

    /// Default configuration file paths in order of preference
    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        for stem in ["treesync", ".treesync"] {
            for ext in ["yaml", "yml", "toml"] {
                paths.push(PathBuf::from(format!("{stem}.{ext}")));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let treesync_dir = config_dir.join("treesync");
            for ext in ["yaml", "yml", "toml"] {
                paths.push(treesync_dir.join(format!("config.{ext}")));
            }
        }

        paths
    }

    /// First configuration file present in the default locations
    pub fn config_exists() -> Option<PathBuf> {
        Self::default_config_paths()
            .into_iter()
            .find(|path| path.exists())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|home| PathBuf::from(home).join(".config"))
                })
        }
    }
}
