//! Synchronization policy
//!
//! Flags deciding what a run is allowed to do to the destination tree and how
//! files are judged equal.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One hour in milliseconds, the unit of timezone skew forgiveness
pub const HOUR_MILLIS: u64 = 60 * 60 * 1000;

/// Skews above this many whole hours are never explained by a timezone
pub const MAX_FORGIVEN_HOURS: u64 = 10;

/// Policy flags for one synchronization session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncPolicy {
    /// Compute and log every decision without touching the disk
    pub simulate: bool,
    /// Remove destination entries that have no source counterpart
    pub delete_stale: bool,
    /// Rename overwritten or removed entries to a `.bkYYYYMMDDHHMM` backup
    pub preserve_old_versions: bool,
    /// Copy when sizes differ
    pub copy_if_sizes_differ: bool,
    /// Copy when modification times differ beyond tolerance
    pub copy_if_dates_differ: bool,
    /// Modification time differences up to this many milliseconds are ignored
    pub date_tolerance_millis: u64,
    /// Only create a destination directory once a file below it is copied
    pub create_dirs_only_with_content: bool,
    /// Collect every source file that ends the run consistent with the destination
    pub track_synchronized_files: bool,
}

impl SyncPolicy {
    /// Policy for a mirror run: stale destination entries are removed
    pub fn mirror() -> Self {
        Self {
            delete_stale: true,
            ..Self::default()
        }
    }

    /// Policy for a versioned backup: stale entries are archived, never lost
    pub fn versioned_backup() -> Self {
        Self {
            delete_stale: true,
            preserve_old_versions: true,
            ..Self::default()
        }
    }

    /// Turn this policy into a dry run
    pub fn simulated(mut self) -> Self {
        self.simulate = true;
        self
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            simulate: false,
            delete_stale: false,
            preserve_old_versions: false,
            copy_if_sizes_differ: true,
            copy_if_dates_differ: true,
            date_tolerance_millis: 0,
            create_dirs_only_with_content: false,
            track_synchronized_files: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = SyncPolicy::default();
        assert!(!policy.simulate);
        assert!(!policy.delete_stale);
        assert!(!policy.preserve_old_versions);
        assert!(policy.copy_if_sizes_differ);
        assert!(policy.copy_if_dates_differ);
        assert_eq!(policy.date_tolerance_millis, 0);
        assert!(!policy.create_dirs_only_with_content);
        assert!(!policy.track_synchronized_files);
    }

    #[test]
    fn test_presets() {
        let mirror = SyncPolicy::mirror();
        assert!(mirror.delete_stale);
        assert!(!mirror.preserve_old_versions);

        let versioned = SyncPolicy::versioned_backup().simulated();
        assert!(versioned.delete_stale);
        assert!(versioned.preserve_old_versions);
        assert!(versioned.simulate);
    }
}
