//! Error types and handling for treesync
//!
//! Errors fall in three families that decide how the walker reacts:
//!
//! - **Configuration**: the session cannot start (roots missing, unreadable, not writable)
//! - **Structural**: the tree can no longer be trusted mid-walk, so the run is aborted
//! - **Entry**: a single file or directory failed; the walk records it and moves on

use std::path::PathBuf;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - the walk continues with the next sibling
    Low,
    /// Medium severity - the operation failed but nothing was damaged
    Medium,
    /// High severity - the session cannot run
    High,
    /// Critical severity - the running walk must stop immediately
    Critical,
}

/// Main error type for treesync operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Source root is not a directory
    #[error("Source folder does not exist: {path}")]
    SourceMissing {
        /// Source root that was checked
        path: PathBuf,
    },

    /// Source root has no visible entry or cannot be listed
    #[error("Source folder cannot be read or is empty: {path}")]
    SourceUnreadable {
        /// Source root that was checked
        path: PathBuf,
    },

    /// Destination root is not a directory
    #[error("Destination folder does not exist: {path}")]
    DestinationMissing {
        /// Destination root that was checked
        path: PathBuf,
    },

    /// Destination root cannot be written
    #[error("Destination folder is not writable: {path}")]
    DestinationNotWritable {
        /// Destination root that was checked
        path: PathBuf,
    },

    /// A source directory disappeared while its children were being processed
    #[error("Folder no longer exists: {path}")]
    SourceVanished {
        /// Directory that vanished
        path: PathBuf,
    },

    /// A directory listing could not be read
    #[error("Failed to list directory '{path}': {message}")]
    DirectoryListing {
        /// Directory being listed
        path: PathBuf,
        /// Underlying I/O message
        message: String,
    },

    /// Copying a file failed
    #[error("Failed to copy '{path}': {message}")]
    Copy {
        /// Source file being copied
        path: PathBuf,
        /// Underlying I/O message
        message: String,
    },

    /// Creating a destination directory failed
    #[error("Failed to create folder '{path}': {message}")]
    CreateDirectory {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O message
        message: String,
    },

    /// Renaming an entry to its backup name failed
    #[error("Failed to rename '{path}' to backup: {message}")]
    Rename {
        /// Entry being archived
        path: PathBuf,
        /// Underlying I/O message
        message: String,
    },

    /// Deleting an entry failed
    #[error("Failed to delete '{path}': {message}")]
    Delete {
        /// Entry being deleted
        path: PathBuf,
        /// Underlying I/O message
        message: String,
    },

    /// A second `sync` was requested while one is running on the same session
    #[error("Synchronization is already running")]
    AlreadyRunning,

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Statistics store error
    #[error("Statistics error: {message}")]
    Statistics {
        /// Error message describing the persistence issue
        message: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Session construction failed
    Configuration,
    /// Tree integrity lost mid-walk
    Structural,
    /// A single entry failed
    Entry,
    /// Concurrent use of one session
    Busy,
    /// I/O related errors
    Io,
    /// Statistics persistence
    Statistics,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceMissing { .. }
            | Self::SourceUnreadable { .. }
            | Self::DestinationMissing { .. }
            | Self::DestinationNotWritable { .. }
            | Self::Config { .. } => ErrorKind::Configuration,
            Self::SourceVanished { .. } | Self::DirectoryListing { .. } => ErrorKind::Structural,
            Self::Copy { .. }
            | Self::CreateDirectory { .. }
            | Self::Rename { .. }
            | Self::Delete { .. } => ErrorKind::Entry,
            Self::AlreadyRunning => ErrorKind::Busy,
            Self::Io { .. } => ErrorKind::Io,
            Self::Statistics { .. } => ErrorKind::Statistics,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self.kind() {
            ErrorKind::Entry => ErrorSeverity::Low,
            ErrorKind::Io | ErrorKind::Statistics | ErrorKind::Busy | ErrorKind::Other => {
                ErrorSeverity::Medium
            }
            ErrorKind::Configuration => ErrorSeverity::High,
            ErrorKind::Structural => ErrorSeverity::Critical,
        }
    }

    /// Whether the walk may continue after this error
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Entry
    }

    /// Whether this error aborts a session (construction or walk)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Structural
        )
    }

    /// Path of the entry involved, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::SourceMissing { path }
            | Self::SourceUnreadable { path }
            | Self::DestinationMissing { path }
            | Self::DestinationNotWritable { path }
            | Self::SourceVanished { path }
            | Self::DirectoryListing { path, .. }
            | Self::Copy { path, .. }
            | Self::CreateDirectory { path, .. }
            | Self::Rename { path, .. }
            | Self::Delete { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new statistics error
    pub fn statistics<S: Into<String>>(message: S) -> Self {
        Self::Statistics {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Create a copy error from an I/O error
    pub fn copy(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::Copy {
            path: path.into(),
            message: error.to_string(),
        }
    }

    /// Create a directory creation error from an I/O error
    pub fn create_directory(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::CreateDirectory {
            path: path.into(),
            message: error.to_string(),
        }
    }

    /// Create a rename error from an I/O error
    pub fn rename(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::Rename {
            path: path.into(),
            message: error.to_string(),
        }
    }

    /// Create a delete error from an I/O error
    pub fn delete(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::Delete {
            path: path.into(),
            message: error.to_string(),
        }
    }

    /// Create a directory listing error from an I/O error
    pub fn listing(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::DirectoryListing {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
