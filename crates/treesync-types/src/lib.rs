//! Core type system and error handling for treesync
//!
//! This crate provides the foundational types shared by the treesync crates:
//!
//! - **Error handling**: the configuration / structural / per-entry error taxonomy
//! - **Policy**: the flags controlling a synchronization session
//! - **Counters**: what a run did, in files and bytes
//! - **Traits**: the entry filter predicate
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use treesync_types::{Result, RunCounters, SyncPolicy};
//!
//! fn example_operation(policy: &SyncPolicy) -> Result<RunCounters> {
//!     let mut counters = RunCounters::new();
//!     if !policy.simulate {
//!         counters.files_copied = 10;
//!         counters.bytes_copied = 1024 * 1024;
//!     }
//!     Ok(counters)
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod policy;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use policy::{SyncPolicy, HOUR_MILLIS, MAX_FORGIVEN_HOURS};
pub use result::Result;
pub use traits::*;
pub use types::*;
