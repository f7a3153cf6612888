//! # Design
//!
//! - One error type for the whole pipeline; collaborator errors are wrapped
//!   with the project or object path they concern.
//! - `kind()` folds everything into the five run-level categories used for
//!   exit codes and failure reports.

use std::error::Error as StdError;
use std::fmt;

use relmirror_github::GitHubError;
use relmirror_index::IndexError;
use relmirror_storage::StorageError;
use thiserror::Error;
use tokio::sync::AcquireError;
use tokio::task::JoinError;

/// Result alias for pipeline operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Run-level classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or API failure talking to a collaborator.
    Transport,
    /// A collaborator call exceeded its timeout.
    Timeout,
    /// The persisted index document is unreadable or malformed.
    CorruptState,
    /// Settings or storage metadata make the run impossible.
    Configuration,
    /// The index could not be encoded or written.
    Serialization,
}

impl ErrorKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::CorruptState => "corrupt_state",
            Self::Configuration => "configuration",
            Self::Serialization => "serialization",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Errors raised by the mirroring pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A release source call failed.
    #[error("release source request failed")]
    Source {
        /// Project being synced.
        project: String,
        /// Underlying platform error.
        source: GitHubError,
    },
    /// An object storage call failed.
    #[error("object storage request failed")]
    Storage {
        /// Object path involved.
        path: String,
        /// Underlying storage error.
        source: StorageError,
    },
    /// Reading bucket metadata failed.
    #[error("storage metadata request failed")]
    Metadata {
        /// Underlying storage error.
        source: StorageError,
    },
    /// The bucket zone could not be resolved, so public URLs cannot be built.
    #[error("storage location unresolved")]
    Location {
        /// Bucket without a known zone.
        bucket: String,
    },
    /// Loading or persisting the index failed.
    #[error("index operation failed")]
    Index {
        /// Underlying index error.
        source: IndexError,
    },
    /// The scratch file used for a transfer failed.
    #[error("scratch file operation failed")]
    Scratch {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// A spawned task panicked or was cancelled.
    #[error("pipeline task failed")]
    Task {
        /// Underlying join error.
        source: JoinError,
    },
    /// The concurrency limiter was closed.
    #[error("concurrency limiter closed")]
    Limiter {
        /// Underlying acquire error.
        source: AcquireError,
    },
}

impl SyncError {
    pub(crate) fn scratch(operation: &'static str) -> impl Fn(std::io::Error) -> Self {
        move |source| Self::Scratch { operation, source }
    }

    /// Run-level category of the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Source { source, .. } => {
                if source.is_timeout() {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::Transport
                }
            }
            Self::Storage { source, .. } | Self::Metadata { source } => {
                if source.is_timeout() {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::Transport
                }
            }
            Self::Location { .. } => ErrorKind::Configuration,
            Self::Index { source } => {
                if source.is_corrupt() {
                    ErrorKind::CorruptState
                } else {
                    ErrorKind::Serialization
                }
            }
            Self::Scratch { .. } | Self::Task { .. } | Self::Limiter { .. } => {
                ErrorKind::Transport
            }
        }
    }

    /// Whether the failure ends the run regardless of the failure policy.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::CorruptState | ErrorKind::Serialization
        )
    }

    /// Whether retrying the failed operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Source { source, .. } => source.is_transient(),
            Self::Storage { source, .. } | Self::Metadata { source } => source.is_transient(),
            Self::Location { .. }
            | Self::Index { .. }
            | Self::Scratch { .. }
            | Self::Task { .. }
            | Self::Limiter { .. } => false,
        }
    }
}

/// Render an error and its sources as `outer: inner: root`.
#[must_use]
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        rendered.push_str(": ");
        rendered.push_str(&source.to_string());
        current = source.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_wrapped_errors() {
        let denied = SyncError::Storage {
            path: "qsctl/v1/a".to_string(),
            source: StorageError::Status {
                operation: "stat",
                path: "qsctl/v1/a".to_string(),
                status: 403,
            },
        };
        assert_eq!(denied.kind(), ErrorKind::Transport);
        assert!(!denied.is_transient());
        assert!(!denied.is_fatal());

        let location = SyncError::Location {
            bucket: "releases".to_string(),
        };
        assert_eq!(location.kind(), ErrorKind::Configuration);
        assert!(location.is_fatal());

        let flaky = SyncError::Source {
            project: "qsctl".to_string(),
            source: GitHubError::Status {
                operation: "list_releases",
                url: "https://api.github.com/repos/qingstor/qsctl/releases".to_string(),
                status: 503,
            },
        };
        assert!(flaky.is_transient());
    }

    #[test]
    fn unreadable_index_is_corrupt_state() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let Err(source) = relmirror_index::Index::load(dir.path()) else {
            anyhow::bail!("loading a directory as the index should fail");
        };
        let error = SyncError::Index { source };
        assert_eq!(error.kind(), ErrorKind::CorruptState);
        assert!(error.is_fatal());
        Ok(())
    }

    #[test]
    fn chain_includes_sources() {
        let error = SyncError::Storage {
            path: "qsctl/v1/a".to_string(),
            source: StorageError::NotFound {
                path: "qsctl/v1/a".to_string(),
            },
        };
        assert_eq!(
            error_chain(&error),
            "object storage request failed: object not found"
        );
    }
}
