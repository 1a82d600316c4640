//! treesync integration testing support
//!
//! Fixture helpers shared by the integration tests in `tests/`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Temporary source/destination trees and session helpers
pub mod test_utils;
