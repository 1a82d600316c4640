//! Backup versioning: archive a destination entry under the run's suffix, or delete it

use crate::walker::WalkResult;
use chrono::{DateTime, Local};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use treesync_types::Error;
use walkdir::WalkDir;

/// `.bk` followed by `YYYYMMDDHHMM` of `at`
pub fn backup_suffix(at: DateTime<Local>) -> String {
    format!(".bk{}", at.format("%Y%m%d%H%M"))
}

/// Archives or deletes destination entries on behalf of one run
#[derive(Debug, Clone)]
pub struct Archiver<'a> {
    name: &'a str,
    suffix: &'a str,
    preserve_old_versions: bool,
    simulate: bool,
}

impl<'a> Archiver<'a> {
    /// Archiver using the session suffix
    pub fn new(name: &'a str, suffix: &'a str, preserve_old_versions: bool, simulate: bool) -> Self {
        Self {
            name,
            suffix,
            preserve_old_versions,
            simulate,
        }
    }

    /// Path the entry would be archived to
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let mut backup = OsString::from(path.as_os_str());
        backup.push(self.suffix);
        PathBuf::from(backup)
    }

    /// Rename `path` to its backup name, or delete it when versioning is off or simulating
    ///
    /// Missing paths are left alone. A failed rename falls back to deletion.
    pub async fn archive_or_delete(&self, path: &Path, result: &mut WalkResult) {
        if fs::symlink_metadata(path).await.is_err() {
            return;
        }

        if !self.preserve_old_versions || self.simulate {
            self.delete_recursively(path, result).await;
            return;
        }

        let backup = self.backup_path(path);
        if fs::symlink_metadata(&backup).await.is_ok() {
            self.delete_recursively(&backup, result).await;
        }

        info!("{}Keeping old version at: {}", self.name, backup.display());
        result.manipulation.resume();
        let renamed = fs::rename(path, &backup).await;
        result.manipulation.suspend();

        match renamed {
            Ok(()) => result.counters.entries_renamed += 1,
            Err(e) => {
                warn!(
                    "{}Could not rename old version, it will be deleted: {}",
                    self.name,
                    path.display()
                );
                self.record_failure(Error::rename(path, &e), result);
                self.delete_recursively(path, result).await;
            }
        }
    }

    /// Delete a file, or a directory and everything below it, deepest entries first
    pub async fn delete_recursively(&self, path: &Path, result: &mut WalkResult) {
        let is_dir = fs::symlink_metadata(path)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);

        if !is_dir {
            self.delete_entry(path, false, result).await;
            return;
        }

        let root = path.to_path_buf();
        let listing = tokio::task::spawn_blocking(move || {
            WalkDir::new(root)
                .follow_links(false)
                .contents_first(true)
                .into_iter()
                .map(|entry| entry.map(|entry| (entry.file_type().is_dir(), entry.into_path())))
                .collect::<Vec<_>>()
        })
        .await;

        let entries = match listing {
            Ok(entries) => entries,
            Err(e) => {
                let error = std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Task join error: {}", e),
                );
                self.record_failure(Error::delete(path, &error), result);
                return;
            }
        };

        for entry in entries {
            match entry {
                Ok((entry_is_dir, entry_path)) => {
                    self.delete_entry(&entry_path, entry_is_dir, result).await;
                }
                Err(e) => {
                    let failed = e.path().unwrap_or(path).to_path_buf();
                    self.record_failure(Error::delete(failed, &std::io::Error::from(e)), result);
                }
            }
        }
    }

    async fn delete_entry(&self, path: &Path, is_dir: bool, result: &mut WalkResult) {
        info!("{}Deleting {}", self.name, path.display());
        if self.simulate {
            result.counters.entries_deleted += 1;
            return;
        }

        result.manipulation.resume();
        let removed = if is_dir {
            fs::remove_dir(path).await
        } else {
            fs::remove_file(path).await
        };
        result.manipulation.suspend();

        match removed {
            Ok(()) => result.counters.entries_deleted += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => self.record_failure(Error::delete(path, &e), result),
        }
    }

    fn record_failure(&self, error: Error, result: &mut WalkResult) {
        warn!("{}{}", self.name, error);
        result.warnings.record(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const SUFFIX: &str = ".bk202401311530";

    #[test]
    fn test_backup_suffix_format() {
        let at = Local.with_ymd_and_hms(2024, 1, 31, 15, 30, 59).unwrap();
        assert_eq!(backup_suffix(at), SUFFIX);
        assert!(crate::filter::is_backup_name(&format!("a.txt{}", backup_suffix(at))));
    }

    #[tokio::test]
    async fn test_delete_without_versioning() {
        let temp_dir = TempDir::new().unwrap();
        let tree = temp_dir.path().join("tree");
        std::fs::create_dir_all(tree.join("a/b")).unwrap();
        std::fs::write(tree.join("a/b/file.txt"), b"x").unwrap();
        std::fs::write(tree.join("top.txt"), b"y").unwrap();

        let archiver = Archiver::new("", SUFFIX, false, false);
        let mut result = WalkResult::new();
        archiver.archive_or_delete(&tree, &mut result).await;

        assert!(!tree.exists());
        // tree, a, a/b, file.txt, top.txt
        assert_eq!(result.counters.entries_deleted, 5);
        assert_eq!(result.counters.entries_renamed, 0);
    }

    #[tokio::test]
    async fn test_archive_replaces_same_minute_backup() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("report.pdf");
        std::fs::write(&file, b"new").unwrap();

        let archiver = Archiver::new("", SUFFIX, true, false);
        let backup = archiver.backup_path(&file);
        std::fs::create_dir_all(backup.join("inner")).unwrap();

        let mut result = WalkResult::new();
        archiver.archive_or_delete(&file, &mut result).await;

        assert!(!file.exists());
        assert!(backup.is_file());
        assert_eq!(std::fs::read(&backup).unwrap(), b"new");
        assert_eq!(result.counters.entries_renamed, 1);
        assert_eq!(result.counters.entries_deleted, 2);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_simulated_archive_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("keep.txt");
        std::fs::write(&file, b"data").unwrap();

        let archiver = Archiver::new("", SUFFIX, true, true);
        let mut result = WalkResult::new();
        archiver.archive_or_delete(&file, &mut result).await;

        assert!(file.is_file());
        assert!(!archiver.backup_path(&file).exists());
        assert_eq!(result.counters.entries_deleted, 1);
    }

    #[tokio::test]
    async fn test_missing_path_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let archiver = Archiver::new("", SUFFIX, true, false);
        let mut result = WalkResult::new();
        archiver
            .archive_or_delete(&temp_dir.path().join("ghost"), &mut result)
            .await;
        assert!(result.counters.is_noop());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_rename_falls_back_to_delete() {
        let temp_dir = TempDir::new().unwrap();
        // 250 bytes fits NAME_MAX, the suffix pushes it over
        let file = temp_dir.path().join("x".repeat(250));
        std::fs::write(&file, b"data").unwrap();

        let archiver = Archiver::new("", SUFFIX, true, false);
        let mut result = WalkResult::new();
        archiver.archive_or_delete(&file, &mut result).await;

        assert!(!file.exists());
        assert_eq!(result.counters.entries_renamed, 0);
        assert_eq!(result.counters.entries_deleted, 1);
        assert_eq!(result.warnings.count(), 1);
        assert!(result.warnings.samples()[0].starts_with("Failed to rename '"));
        assert!(result.warnings.samples()[0].contains("to backup"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delete_failure_is_a_warning() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let tree = temp_dir.path().join("locked");
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("inside.txt"), b"x").unwrap();
        std::fs::set_permissions(&tree, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Permission bits do not bind root
        let writable = std::fs::File::create(tree.join("check")).is_ok();
        if writable {
            let _ = std::fs::remove_file(tree.join("check"));
            std::fs::set_permissions(&tree, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let archiver = Archiver::new("", SUFFIX, false, false);
        let mut result = WalkResult::new();
        archiver.delete_recursively(&tree, &mut result).await;

        std::fs::set_permissions(&tree, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(tree.join("inside.txt").exists());
        assert_eq!(result.counters.entries_deleted, 0);
        // inside.txt, then the folder that still holds it
        assert_eq!(result.warnings.count(), 2);
        assert!(result.warnings.samples()[0].starts_with("Failed to delete '"));
    }
}
