//! Folder synchronization and versioned incremental backup for treesync
//!
//! This crate keeps a destination tree consistent with a source tree:
//!
//! - **Change Detection**: Files are copied when missing, resized or re-dated, with
//!   whole-hour timezone skews forgiven
//! - **Mirroring**: Destination entries gone from the source can be removed
//! - **Versioned Backup**: Overwritten or removed entries can be kept under a
//!   `.bkYYYYMMDDHHMM` suffix instead of being deleted
//! - **Dry Runs**: Every decision can be logged without touching the disk
//! - **Progress and Statistics**: Periodic progress lines with an ETA computed from
//!   the previous run, persisted in a properties file
//!
//! # Examples
//!
//! ```rust,no_run
//! use treesync_sync::Synchronizer;
//! use treesync_types::SyncPolicy;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut sync = Synchronizer::with_name("photos", "/data/photos", "/mnt/backup/photos")?;
//! sync.set_policy(SyncPolicy::versioned_backup());
//! let report = sync.sync().await?;
//! report.log();
//! println!("Copied {} files", report.counters.files_copied);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backup;
pub mod compare;
pub mod copy;
pub mod filter;
pub mod progress;
pub mod report;
pub mod session;
pub mod stats;
pub mod walker;

pub use backup::{backup_suffix, Archiver};
pub use compare::{copy_reason, dates_differ, must_copy, CopyReason};
pub use copy::{FileCopier, COPY_CHUNK_SIZE, DEFAULT_COPY_PROGRESS_INTERVAL};
pub use filter::{exclude_extensions, is_backup_name, is_globally_ignored, SyncFilter};
pub use progress::{ProgressBaseline, ProgressReporter, ProgressState, DEFAULT_PROGRESS_INTERVAL};
pub use report::{FreeSpace, IssueLog, SummaryLevel, SummaryLine, SyncReport, SAMPLE_LIMIT};
pub use session::{Synchronizer, DEFAULT_STATISTICS_FILE};
pub use stats::{KeyValueStore, MemoryStore, PropertiesFileStore, StatisticsKeys, SyncStatistics};
pub use walker::{TreeWalker, WalkResult};
