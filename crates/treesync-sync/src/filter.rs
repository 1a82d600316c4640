//! Entry filtering shared by the source listing and the stale-deletion pass

use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use treesync_types::EntryFilter;

/// Matches names produced by backup versioning, e.g. `report.pdf.bk202401311530`
static BACKUP_NAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\.bk\d{12}$").ok());

/// Operating system clutter that is never synchronized
const IGNORED_NAMES: [&str; 2] = [".DS_Store", "iPod Photo Cache"];

/// Whether `name` carries the reserved backup suffix
pub fn is_backup_name(name: &str) -> bool {
    BACKUP_NAME
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

/// Whether an entry is skipped in both trees regardless of configuration
pub fn is_globally_ignored(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    if IGNORED_NAMES.contains(&name.as_ref()) {
        return true;
    }
    if name.to_lowercase().contains("icon?") {
        return true;
    }
    is_backup_name(&name)
}

/// Global ignore list plus an optional caller-supplied predicate
#[derive(Clone, Default)]
pub struct SyncFilter {
    custom: Option<Arc<dyn EntryFilter>>,
}

impl SyncFilter {
    /// Filter with only the global ignore list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom predicate, replacing any previous one
    pub fn with_custom(mut self, filter: Arc<dyn EntryFilter>) -> Self {
        self.custom = Some(filter);
        self
    }

    /// Whether the entry survives the global ignore list
    pub fn is_listed(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|name| !is_globally_ignored(name))
    }

    /// Whether the custom predicate, if any, keeps the entry
    pub fn is_selected(&self, path: &Path) -> bool {
        self.custom.as_ref().map_or(true, |filter| filter.accept(path))
    }

    /// Whether the entry takes part in the sync
    pub fn accepts(&self, path: &Path) -> bool {
        self.is_listed(path) && self.is_selected(path)
    }

    /// Whether a custom predicate is installed
    pub fn has_custom(&self) -> bool {
        self.custom.is_some()
    }
}

impl fmt::Debug for SyncFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncFilter")
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

/// Custom predicate rejecting the given extensions (compared case-insensitively, without dot)
pub fn exclude_extensions<I, S>(extensions: I) -> Arc<dyn EntryFilter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let excluded: Vec<String> = extensions
        .into_iter()
        .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
        .collect();

    Arc::new(move |path: &Path| {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map_or(true, |ext| !excluded.contains(&ext))
    })
}
