//! Core traits for treesync operations

use std::path::Path;

/// Predicate deciding whether a walked entry takes part in the sync
///
/// Entries rejected by a filter are neither copied from the source nor
/// removed from the destination.
pub trait EntryFilter: Send + Sync {
    /// Return `true` to keep the entry
    fn accept(&self, path: &Path) -> bool;
}

impl<F> EntryFilter for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn accept(&self, path: &Path) -> bool {
        self(path)
    }
}
