//! # Design
//!
//! - Constant error messages; the path and operation travel as fields.
//! - A persisted document that cannot be parsed (`Corrupt`) or cannot be read
//!   (`Unreadable`) is corrupt state; other IO failures are not.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors produced while loading or persisting the index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The persisted document is not valid JSON of the expected shape.
    #[error("index document is corrupt")]
    Corrupt {
        /// Document that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The persisted document exists but could not be read.
    #[error("index document is unreadable")]
    Unreadable {
        /// Document that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Encoding the index failed.
    #[error("index serialization failed")]
    Serialize {
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Filesystem access failed.
    #[error("index io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl IndexError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Returns `true` when the persisted document is damaged or unreadable.
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. } | Self::Unreadable { .. })
    }
}
