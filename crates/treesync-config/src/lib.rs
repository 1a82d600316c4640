//! Configuration management system for treesync
//!
//! Sync sessions are configured from layered sources: built-in defaults, an
//! optional YAML/TOML/JSON file and `TREESYNC__*` environment variables.
//!
//! # Examples
//!
//! ```rust
//! use treesync_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_source_file("treesync.yaml")
//!     .add_env_prefix("TREESYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Progress every {}s", config.progress.interval_secs);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use treesync_types::SyncPolicy;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Default location of the cross-run statistics file, relative to the working directory
pub const DEFAULT_STATISTICS_FILE: &str = "tmp/estatisticas_copias.properties";

/// Main configuration structure for treesync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Synchronization policy defaults
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Cross-run statistics persistence
    #[serde(default)]
    pub statistics: StatisticsConfig,
    /// Progress reporting
    #[serde(default)]
    pub progress: ProgressConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Policy section, mirrors [`SyncPolicy`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Dry run
    pub simulate: bool,
    /// Remove destination entries without a source counterpart
    pub delete_stale: bool,
    /// Keep overwritten/removed entries as `.bkYYYYMMDDHHMM` backups
    pub preserve_old_versions: bool,
    /// Copy when sizes differ
    pub copy_if_sizes_differ: bool,
    /// Copy when modification times differ
    pub copy_if_dates_differ: bool,
    /// Ignored modification time difference, in milliseconds
    pub date_tolerance_millis: u64,
    /// Defer directory creation until a file is copied below it
    pub create_dirs_only_with_content: bool,
    /// Collect the list of synchronized source files
    pub track_synchronized_files: bool,
    /// Extensions (without dot) excluded from both trees
    pub exclude_extensions: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let policy = SyncPolicy::default();
        Self {
            simulate: policy.simulate,
            delete_stale: policy.delete_stale,
            preserve_old_versions: policy.preserve_old_versions,
            copy_if_sizes_differ: policy.copy_if_sizes_differ,
            copy_if_dates_differ: policy.copy_if_dates_differ,
            date_tolerance_millis: policy.date_tolerance_millis,
            create_dirs_only_with_content: policy.create_dirs_only_with_content,
            track_synchronized_files: policy.track_synchronized_files,
            exclude_extensions: Vec::new(),
        }
    }
}

impl PolicyConfig {
    /// Build the engine policy from this section
    pub fn to_sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            simulate: self.simulate,
            delete_stale: self.delete_stale,
            preserve_old_versions: self.preserve_old_versions,
            copy_if_sizes_differ: self.copy_if_sizes_differ,
            copy_if_dates_differ: self.copy_if_dates_differ,
            date_tolerance_millis: self.date_tolerance_millis,
            create_dirs_only_with_content: self.create_dirs_only_with_content,
            track_synchronized_files: self.track_synchronized_files,
        }
    }
}

/// Statistics persistence section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Whether previous-run statistics are loaded and saved
    pub enabled: bool,
    /// Properties file shared by every session run from the same directory
    pub file: PathBuf,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: PathBuf::from(DEFAULT_STATISTICS_FILE),
        }
    }
}

/// Progress reporting section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Seconds between two progress lines
    pub interval_secs: u64,
    /// Milliseconds between two per-file copy progress lines
    pub copy_progress_interval_millis: u64,
}

impl ProgressConfig {
    /// Interval of the background progress reporter
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Interval of per-file copy progress lines
    pub fn copy_progress_interval(&self) -> Duration {
        Duration::from_millis(self.copy_progress_interval_millis)
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            copy_progress_interval_millis: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}
