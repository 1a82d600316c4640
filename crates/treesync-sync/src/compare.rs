//! Decides whether a source file must be copied over its destination counterpart

use treesync_types::{FileMeta, SyncPolicy, HOUR_MILLIS, MAX_FORGIVEN_HOURS};

/// Why a file was judged out of date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyReason {
    /// Nothing at the destination path
    Missing,
    /// A directory occupies the destination path
    TypeChanged,
    /// Lengths differ
    SizeDiffers {
        /// Source length
        source: u64,
        /// Destination length
        destination: u64,
    },
    /// Modification times differ by more than a timezone skew explains
    DateDiffers {
        /// Absolute difference in milliseconds
        skew_millis: u64,
    },
}

/// Compare source and destination metadata under `policy`
///
/// Returns `None` when the destination is already synchronized.
pub fn copy_reason(
    source: &FileMeta,
    destination: Option<&FileMeta>,
    policy: &SyncPolicy,
) -> Option<CopyReason> {
    let Some(destination) = destination else {
        return Some(CopyReason::Missing);
    };

    if destination.is_dir {
        return Some(CopyReason::TypeChanged);
    }

    if policy.copy_if_sizes_differ && source.size != destination.size {
        return Some(CopyReason::SizeDiffers {
            source: source.size,
            destination: destination.size,
        });
    }

    if policy.copy_if_dates_differ {
        let skew_millis = source.modified_millis.abs_diff(destination.modified_millis);
        if dates_differ(skew_millis, policy.date_tolerance_millis) {
            return Some(CopyReason::DateDiffers { skew_millis });
        }
    }

    None
}

/// Shorthand for `copy_reason(..).is_some()`
pub fn must_copy(source: &FileMeta, destination: Option<&FileMeta>, policy: &SyncPolicy) -> bool {
    copy_reason(source, destination, policy).is_some()
}

/// Whole-hour skews up to ten hours are read as a timezone mismatch, not a change.
///
/// The tolerance only applies to the raw skew: `6h + 55ms` is copied unless the
/// tolerance covers the whole skew. Half-hour timezone offsets are not recognised.
pub fn dates_differ(skew_millis: u64, tolerance_millis: u64) -> bool {
    if skew_millis <= tolerance_millis {
        return false;
    }

    let hours = skew_millis / HOUR_MILLIS;
    hours > MAX_FORGIVEN_HOURS || skew_millis % HOUR_MILLIS != 0
}
