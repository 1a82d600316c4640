//! Depth-first walk of the source tree in lock-step with the destination tree

use crate::backup::Archiver;
use crate::compare::{copy_reason, CopyReason};
use crate::copy::FileCopier;
use crate::filter::SyncFilter;
use crate::progress::ProgressState;
use crate::report::{format_duration_hms, IssueLog, Stopwatch};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, error, info, warn};
use treesync_types::{EntryKind, Error, FileMeta, Result, RunCounters, SyncPolicy};

/// Everything one walk produced, threaded through the recursion
#[derive(Debug, Clone, Default)]
pub struct WalkResult {
    /// What the walk did
    pub counters: RunCounters,
    /// Per-entry errors
    pub errors: IssueLog,
    /// Skipped entries and fallbacks
    pub warnings: IssueLog,
    /// Source files consistent with the destination, in visit order
    pub synchronized_files: Vec<PathBuf>,
    /// Time spent renaming, deleting and copying
    pub manipulation: Stopwatch,
}

impl WalkResult {
    /// Empty result
    pub fn new() -> Self {
        Self::default()
    }
}

/// Applies the policy to one pair of directory trees
#[derive(Debug)]
pub struct TreeWalker<'a> {
    name: &'a str,
    policy: SyncPolicy,
    filter: &'a SyncFilter,
    archiver: Archiver<'a>,
    copier: FileCopier,
    progress: Arc<ProgressState>,
}

impl<'a> TreeWalker<'a> {
    /// Walker for one run
    pub fn new(
        name: &'a str,
        policy: SyncPolicy,
        filter: &'a SyncFilter,
        backup_suffix: &'a str,
        copy_progress_interval: Duration,
        progress: Arc<ProgressState>,
    ) -> Self {
        Self {
            name,
            policy,
            filter,
            archiver: Archiver::new(
                name,
                backup_suffix,
                policy.preserve_old_versions,
                policy.simulate,
            ),
            copier: FileCopier::new(name, copy_progress_interval),
            progress,
        }
    }

    /// Synchronize `destination` with `source`
    ///
    /// Per-entry failures are recorded in `result`; a vanished source folder or an
    /// unreadable listing aborts the walk with an error.
    pub async fn walk(&self, source: &Path, destination: &Path, result: &mut WalkResult) -> Result<()> {
        self.walk_directory(source, destination, result).await
    }

    fn walk_directory<'b>(
        &'b self,
        source: &'b Path,
        destination: &'b Path,
        result: &'b mut WalkResult,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'b>> {
        Box::pin(async move {
            let parent_dir = self.progress.enter_dir(source).await;

            if self.policy.delete_stale {
                self.remove_stale(source, destination, result).await?;
            }

            for child in list_children(source, self.filter).await? {
                if !self.filter.is_selected(&child) {
                    debug!("{}Ignoring {}", self.name, child.display());
                    continue;
                }

                ensure_dir_exists(source).await?;

                let Some(file_name) = child.file_name() else {
                    continue;
                };
                let dest_child = destination.join(file_name);

                let metadata = match fs::symlink_metadata(&child).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        let message = format!("Cannot read: {}", child.display());
                        warn!("{}{} ({})", self.name, message, e);
                        result.warnings.record(message);
                        continue;
                    }
                };

                match EntryKind::from_file_type(metadata.file_type()) {
                    EntryKind::Symlink => {
                        debug!("{}Ignoring symbolic link: {}", self.name, child.display());
                    }
                    EntryKind::Directory => {
                        if !self.prepare_directory(&dest_child, result).await {
                            continue;
                        }
                        self.walk_directory(&child, &dest_child, result).await?;
                    }
                    EntryKind::File => {
                        let source_meta = FileMeta::from_metadata(&metadata);
                        self.sync_file(&child, &dest_child, source_meta, result).await;
                    }
                    EntryKind::Other => {
                        let message = format!("Unknown entry type: {}", child.display());
                        warn!("{}{}", self.name, message);
                        result.warnings.record(message);
                    }
                }
            }

            result.counters.folders_visited += 1;
            self.progress.leave_dir(parent_dir, result).await;
            Ok(())
        })
    }

    /// Archive or delete destination children without a source counterpart
    async fn remove_stale(&self, source: &Path, destination: &Path, result: &mut WalkResult) -> Result<()> {
        let is_dir = fs::symlink_metadata(destination)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Ok(());
        }

        debug!(
            "{}Listing destination for stale entries: {}",
            self.name,
            destination.display()
        );
        for dest_child in list_children(destination, self.filter).await? {
            if !self.filter.is_selected(&dest_child) {
                continue;
            }

            ensure_dir_exists(source).await?;

            let Some(file_name) = dest_child.file_name() else {
                continue;
            };
            if fs::symlink_metadata(source.join(file_name)).await.is_ok() {
                continue;
            }

            if !self.policy.preserve_old_versions {
                info!(
                    "{}Deleting, no longer in source: {}",
                    self.name,
                    dest_child.display()
                );
            }
            self.archiver.archive_or_delete(&dest_child, result).await;
        }
        Ok(())
    }

    /// Clear a file blocking the directory and create it unless creation is deferred
    ///
    /// Returns `false` when the directory could not be created.
    async fn prepare_directory(&self, dest_child: &Path, result: &mut WalkResult) -> bool {
        let blocked = fs::symlink_metadata(dest_child)
            .await
            .is_ok_and(|metadata| !metadata.is_dir());
        if blocked {
            self.archiver.archive_or_delete(dest_child, result).await;
        }

        if self.policy.simulate || self.policy.create_dirs_only_with_content {
            return true;
        }

        match fs::create_dir_all(dest_child).await {
            Ok(()) => true,
            Err(e) => {
                let error = Error::create_directory(dest_child, &e);
                error!("{}{}", self.name, error);
                result.errors.record_for(error.to_string(), dest_child);
                false
            }
        }
    }

    async fn sync_file(&self, source: &Path, destination: &Path, source_meta: FileMeta, result: &mut WalkResult) {
        if fs::File::open(source).await.is_err() {
            let message = format!("Cannot read: {}", source.display());
            warn!("{}{}", self.name, message);
            result.warnings.record(message);
            return;
        }

        result.counters.source_files += 1;
        result.counters.source_bytes += source_meta.size;

        let dest_meta = fs::symlink_metadata(destination)
            .await
            .ok()
            .map(|metadata| FileMeta::from_metadata(&metadata));

        let Some(reason) = copy_reason(&source_meta, dest_meta.as_ref(), &self.policy) else {
            result.counters.files_in_sync += 1;
            result.counters.bytes_in_sync += source_meta.size;
            self.track(source, result);
            return;
        };
        self.log_reason(source, destination, reason);

        self.progress.set_file(Some(destination.to_path_buf())).await;
        let copied = self.replace_file(source, destination, source_meta.size, result).await;
        self.progress.set_file(None).await;

        match copied {
            Ok(bytes) => {
                result.counters.files_copied += 1;
                result.counters.bytes_copied += bytes;
                self.track(source, result);
            }
            Err(error) => {
                error!("{}{}", self.name, error);
                result.errors.record_for(error.to_string(), source);
            }
        }
    }

    async fn replace_file(
        &self,
        source: &Path,
        destination: &Path,
        size: u64,
        result: &mut WalkResult,
    ) -> Result<u64> {
        self.archiver.archive_or_delete(destination, result).await;

        if self.policy.simulate {
            debug!("{}Copying file {}", self.name, source.display());
            return Ok(size);
        }

        if self.policy.create_dirs_only_with_content {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::create_directory(parent, &e))?;
            }
        }

        result.manipulation.resume();
        let copied = self.copier.copy_with_attributes(source, destination).await;
        result.manipulation.suspend();
        self.progress.publish_manipulation(result.manipulation.elapsed());

        copied.map_err(|e| Error::copy(source, &e))
    }

    fn track(&self, source: &Path, result: &mut WalkResult) {
        if self.policy.track_synchronized_files {
            result.synchronized_files.push(source.to_path_buf());
        }
    }

    fn log_reason(&self, source: &Path, destination: &Path, reason: CopyReason) {
        match reason {
            CopyReason::Missing => {
                info!("{}Destination does not exist: {}", self.name, destination.display());
            }
            CopyReason::TypeChanged => {
                info!("{}Destination is a folder: {}", self.name, destination.display());
            }
            CopyReason::SizeDiffers {
                source: source_size,
                destination: destination_size,
            } => {
                info!(
                    "{}Different size ({} - {}): {}",
                    self.name,
                    source_size,
                    destination_size,
                    source.display()
                );
            }
            CopyReason::DateDiffers { skew_millis } => {
                info!(
                    "{}Different modification date (difference of {}): {}",
                    self.name,
                    format_duration_hms(Duration::from_millis(skew_millis)),
                    source.display()
                );
            }
        }
    }
}

/// Children of `dir` surviving the global ignore list, sorted by name
pub async fn list_children(dir: &Path, filter: &SyncFilter) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| Error::listing(dir, &e))?;

    let mut children = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::listing(dir, &e))?
    {
        let path = entry.path();
        if filter.is_listed(&path) {
            children.push(path);
        }
    }

    children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(children)
}

/// Fails when `dir` is no longer a directory, e.g. after a removable drive was ejected
pub async fn ensure_dir_exists(dir: &Path) -> Result<()> {
    match fs::metadata(dir).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        _ => Err(Error::SourceVanished {
            path: dir.to_path_buf(),
        }),
    }
}
