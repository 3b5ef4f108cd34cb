//! Error types for the directory changes source.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur while watching a directory.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The watched path does not exist or is not a directory.
    #[error("invalid directory {}: {reason}", .path.display())]
    InvalidDirectory {
        path: PathBuf,
        reason: InvalidDirectoryReason,
    },

    /// More undelivered events than the configured capacity.
    #[error("buffer overflow: more than {capacity} undelivered changes")]
    BufferOverflow { capacity: usize },

    /// The notification mechanism failed or the watched root went away.
    #[error("notification primitive failure: {0}")]
    NotificationPrimitiveFailure(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Why a path was rejected as the watch root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidDirectoryReason {
    NotFound,
    NotADirectory,
}

impl fmt::Display for InvalidDirectoryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not found"),
            Self::NotADirectory => f.write_str("not a directory"),
        }
    }
}
