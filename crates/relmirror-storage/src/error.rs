//! # Design
//!
//! - `NotFound` is the one expected signal; everything else is a failure.
//! - Constant messages; object path and operation travel as fields.

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by object storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object does not exist.
    #[error("object not found")]
    NotFound {
        /// Object key that was looked up.
        path: String,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build storage http client")]
    ClientBuild {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// A URL could not be parsed.
    #[error("invalid storage url")]
    InvalidUrl {
        /// Offending URL text.
        url: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// A URL cannot carry path segments.
    #[error("storage url cannot be a base")]
    UrlNotBase {
        /// Offending URL text.
        url: String,
    },
    /// The bucket zone is neither configured nor detectable.
    #[error("storage location unknown")]
    UnknownLocation {
        /// Bucket whose zone could not be resolved.
        bucket: String,
    },
    /// Request signing failed.
    #[error("storage request signing failed")]
    Signing {
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// The request failed before a response arrived.
    #[error("storage request failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Object key involved.
        path: String,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The request exceeded the configured timeout.
    #[error("storage request timed out")]
    Timeout {
        /// Operation identifier.
        operation: &'static str,
        /// Object key involved.
        path: String,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The backend answered with an unexpected status.
    #[error("storage response status error")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// Object key involved.
        path: String,
        /// HTTP status code returned.
        status: u16,
    },
    /// Reading the upload body failed.
    #[error("storage io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Object key involved.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn request(operation: &'static str, path: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                operation,
                path: path.to_string(),
                source,
            }
        } else {
            Self::Http {
                operation,
                path: path.to_string(),
                source,
            }
        }
    }

    /// Returns `true` for the explicit "object not found" signal.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` when the request exceeded its timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` for failures worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } | Self::Timeout { .. } | Self::Io { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound { .. }
            | Self::ClientBuild { .. }
            | Self::InvalidUrl { .. }
            | Self::UrlNotBase { .. }
            | Self::UnknownLocation { .. }
            | Self::Signing { .. } => false,
        }
    }
}
