//! Unified fixture utilities for treesync integration tests

use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use treesync_sync::{MemoryStore, Synchronizer};

/// A source and a destination folder inside one temporary directory
pub struct SyncFixture {
    temp_dir: TempDir,
    /// Source root
    pub source: PathBuf,
    /// Destination root
    pub destination: PathBuf,
    /// Statistics store handed to sessions built by [`SyncFixture::session`]
    pub store: Arc<MemoryStore>,
}

impl SyncFixture {
    /// Create both roots, empty
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let source = temp_dir.path().join("source");
        let destination = temp_dir.path().join("destination");
        fs::create_dir_all(&source).expect("Failed to create source");
        fs::create_dir_all(&destination).expect("Failed to create destination");
        Self {
            temp_dir,
            source,
            destination,
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Temporary directory holding both roots
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Session over the fixture with in-memory statistics and fast progress
    pub fn session(&self) -> Synchronizer {
        let mut session = Synchronizer::with_name("test", &self.source, &self.destination)
            .expect("Failed to create session");
        session
            .set_statistics_store(Some(self.store.clone()))
            .set_progress_interval(Duration::from_millis(50));
        session
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `contents` at `relative` under `root`, creating parent folders
pub fn write_file(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent");
    }
    fs::write(&path, contents).expect("Failed to write test file");
    path
}

/// Create the folder `relative` under `root`
pub fn make_dir(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(&path).expect("Failed to create test dir");
    path
}

/// Remove a file or a folder tree if present
pub fn remove(path: &Path) {
    if path.is_dir() {
        fs::remove_dir_all(path).expect("Failed to remove test dir");
    } else if path.exists() {
        fs::remove_file(path).expect("Failed to remove test file");
    }
}

/// Set the modification time of `path` to `unix_seconds` plus `millis`
pub fn set_mtime(path: &Path, unix_seconds: i64, millis: u32) {
    let time = FileTime::from_unix_time(unix_seconds, millis * 1_000_000);
    filetime::set_file_mtime(path, time).expect("Failed to set mtime");
}

/// Sorted names of the entries directly under `dir`
pub fn names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to list dir")
        .map(|entry| {
            entry
                .expect("Failed to read entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}
