//! Core data types for treesync
//!
//! Counters accumulated by a run and the classification of walked entries.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fs::FileType;

/// Counters accumulated during one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunCounters {
    /// Source directories fully processed
    pub folders_visited: u64,
    /// Regular files seen in the source
    pub source_files: u64,
    /// Bytes of regular files seen in the source
    pub source_bytes: u64,
    /// Files copied to the destination
    pub files_copied: u64,
    /// Bytes written while copying
    pub bytes_copied: u64,
    /// Destination files and folders deleted
    pub entries_deleted: u64,
    /// Destination files and folders renamed to a backup name
    pub entries_renamed: u64,
    /// Source files found already in sync
    pub files_in_sync: u64,
    /// Bytes of source files found already in sync
    pub bytes_in_sync: u64,
}

impl RunCounters {
    /// Create a new empty counter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge counters from another instance
    pub fn merge(&mut self, other: &RunCounters) {
        self.folders_visited += other.folders_visited;
        self.source_files += other.source_files;
        self.source_bytes += other.source_bytes;
        self.files_copied += other.files_copied;
        self.bytes_copied += other.bytes_copied;
        self.entries_deleted += other.entries_deleted;
        self.entries_renamed += other.entries_renamed;
        self.files_in_sync += other.files_in_sync;
        self.bytes_in_sync += other.bytes_in_sync;
    }

    /// Whether the run changed nothing on the destination
    pub fn is_noop(&self) -> bool {
        self.files_copied == 0 && self.entries_deleted == 0 && self.entries_renamed == 0
    }
}

/// Kind of a walked filesystem entry, never following symbolic links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EntryKind {
    /// Directory
    Directory,
    /// Regular file
    File,
    /// Symbolic link (always skipped)
    Symlink,
    /// Device, socket, fifo or anything else
    Other,
}

impl EntryKind {
    /// Classify a file type obtained without following links
    pub fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// Size and modification time of a regular file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileMeta {
    /// Length in bytes
    pub size: u64,
    /// Modification time in milliseconds since the Unix epoch
    pub modified_millis: i64,
    /// Whether the entry is a directory rather than a file
    pub is_dir: bool,
}

impl FileMeta {
    /// Build from standard metadata
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let modified_millis = metadata
            .modified()
            .ok()
            .map_or(0, system_time_to_millis);

        Self {
            size: metadata.len(),
            modified_millis,
            is_dir: metadata.is_dir(),
        }
    }
}

/// Milliseconds since the Unix epoch, negative before it
pub fn system_time_to_millis(time: std::time::SystemTime) -> i64 {
    match time.duration_since(std::time::UNIX_EPOCH) {
        Ok(after) => after.as_millis() as i64,
        Err(before) => -(before.duration().as_millis() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_counters_merge() {
        let mut first = RunCounters::new();
        first.files_copied = 5;
        first.bytes_copied = 1000;

        let mut second = RunCounters::new();
        second.files_copied = 3;
        second.bytes_copied = 500;
        second.entries_renamed = 1;

        first.merge(&second);
        assert_eq!(first.files_copied, 8);
        assert_eq!(first.bytes_copied, 1500);
        assert_eq!(first.entries_renamed, 1);
        assert!(!first.is_noop());
        assert!(RunCounters::new().is_noop());
    }

    #[test]
    fn test_millis_conversion() {
        assert_eq!(
            system_time_to_millis(UNIX_EPOCH + Duration::from_millis(1_500)),
            1_500
        );
        assert_eq!(
            system_time_to_millis(UNIX_EPOCH - Duration::from_millis(250)),
            -250
        );
    }
}
