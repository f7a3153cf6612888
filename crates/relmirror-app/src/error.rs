//! # Design
//!
//! - Centralize application-level errors and their process exit codes.
//! - Keep error messages constant while carrying context fields for debugging.

use relmirror_config::ConfigError;
use relmirror_github::GitHubError;
use relmirror_storage::StorageError;
use relmirror_sync::{ErrorKind, SyncError};
use relmirror_telemetry::TelemetryError;
use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Exit code for a run where every project synced.
pub const EXIT_OK: i32 = 0;
/// Exit code for telemetry failures outside the pipeline.
pub const EXIT_INTERNAL: i32 = 1;
/// Exit code for invalid or incomplete configuration.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for an unreadable index document.
pub const EXIT_CORRUPT_STATE: i32 = 3;
/// Exit code for collaborator transport failures.
pub const EXIT_TRANSPORT: i32 = 4;
/// Exit code for collaborator timeouts.
pub const EXIT_TIMEOUT: i32 = 5;
/// Exit code for index encoding or write failures.
pub const EXIT_SERIALIZATION: i32 = 6;
/// Exit code for a finished run with failed projects.
pub const EXIT_PARTIAL: i32 = 7;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration validation failed.
    #[error("configuration invalid")]
    Config {
        /// Source configuration error.
        source: ConfigError,
    },
    /// Building the hosting platform client failed.
    #[error("release source setup failed")]
    GitHub {
        /// Operation identifier.
        operation: &'static str,
        /// Source platform error.
        source: GitHubError,
    },
    /// Building the storage client failed.
    #[error("object storage setup failed")]
    Storage {
        /// Operation identifier.
        operation: &'static str,
        /// Source storage error.
        source: StorageError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: TelemetryError,
    },
    /// The mirroring run failed.
    #[error("sync run failed")]
    Sync {
        /// Source pipeline error.
        source: SyncError,
    },
    /// The run finished but some projects failed.
    #[error("sync finished with failed projects")]
    PartialFailure {
        /// Names of the failed projects.
        projects: Vec<String>,
    },
}

impl AppError {
    pub(crate) const fn github(operation: &'static str, source: GitHubError) -> Self {
        Self::GitHub { operation, source }
    }

    pub(crate) const fn storage(operation: &'static str, source: StorageError) -> Self {
        Self::Storage { operation, source }
    }

    pub(crate) const fn telemetry(operation: &'static str, source: TelemetryError) -> Self {
        Self::Telemetry { operation, source }
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::GitHub { .. } | Self::Storage { .. } => EXIT_CONFIG,
            Self::Telemetry { .. } => EXIT_INTERNAL,
            Self::Sync { source } => match source.kind() {
                ErrorKind::Configuration => EXIT_CONFIG,
                ErrorKind::CorruptState => EXIT_CORRUPT_STATE,
                ErrorKind::Transport => EXIT_TRANSPORT,
                ErrorKind::Timeout => EXIT_TIMEOUT,
                ErrorKind::Serialization => EXIT_SERIALIZATION,
            },
            Self::PartialFailure { .. } => EXIT_PARTIAL,
        }
    }

    /// Single-line diagnostic naming the failure and its source chain.
    #[must_use]
    pub fn display_message(self) -> String {
        match self {
            Self::PartialFailure { ref projects } => {
                format!("{self}: {}", projects.join(", "))
            }
            other => format!("{:#}", anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmirror_index::IndexError;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn configuration_errors_exit_with_two() {
        let error = AppError::Config {
            source: ConfigError::Missing {
                field: "access_key",
            },
        };
        assert_eq!(error.exit_code(), EXIT_CONFIG);
        assert!(error.display_message().starts_with("configuration invalid: "));
    }

    #[test]
    fn sync_error_kinds_map_to_distinct_codes() {
        let corrupt = AppError::Sync {
            source: SyncError::Index {
                source: IndexError::Corrupt {
                    path: PathBuf::from("site/data.json"),
                    source: serde_json::from_str::<serde_json::Value>("{")
                        .expect_err("truncated json"),
                },
            },
        };
        assert_eq!(corrupt.exit_code(), EXIT_CORRUPT_STATE);

        let unwritable = AppError::Sync {
            source: SyncError::Index {
                source: IndexError::Io {
                    operation: "index.persist",
                    path: PathBuf::from("site/data.json"),
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                },
            },
        };
        assert_eq!(unwritable.exit_code(), EXIT_SERIALIZATION);

        let unreadable = AppError::Sync {
            source: SyncError::Index {
                source: IndexError::Unreadable {
                    path: PathBuf::from("site/data.json"),
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                },
            },
        };
        assert_eq!(unreadable.exit_code(), EXIT_CORRUPT_STATE);

        let scratch = AppError::Sync {
            source: SyncError::Scratch {
                operation: "scratch.create",
                source: io::Error::other("disk full"),
            },
        };
        assert_eq!(scratch.exit_code(), EXIT_TRANSPORT);
    }

    #[test]
    fn partial_failure_lists_projects() {
        let error = AppError::PartialFailure {
            projects: vec!["qsctl".to_string(), "qscamel".to_string()],
        };
        assert_eq!(error.exit_code(), EXIT_PARTIAL);
        assert_eq!(
            error.display_message(),
            "sync finished with failed projects: qsctl, qscamel"
        );
    }
}
