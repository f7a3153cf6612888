//! # Design
//!
//! - Constant messages; operation and URL are carried as fields.
//! - Timeouts get their own variant so callers can attribute them.
//! - `is_transient` is the single place that decides what may be retried.

use std::io;

use thiserror::Error;
use url::Url;

/// Result alias for hosting-platform operations.
pub type GitHubResult<T> = Result<T, GitHubError>;

/// Errors raised while talking to the hosting platform.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The HTTP client could not be constructed.
    #[error("failed to build github http client")]
    ClientBuild {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The API token cannot be used as a header value.
    #[error("github token contains invalid characters")]
    InvalidToken,
    /// A URL could not be parsed.
    #[error("invalid github url")]
    InvalidUrl {
        /// Offending URL text.
        url: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// A URL cannot carry path segments.
    #[error("github url cannot be a base")]
    UrlNotBase {
        /// Offending URL text.
        url: String,
    },
    /// The request failed before a response arrived.
    #[error("github request failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The request exceeded the configured timeout.
    #[error("github request timed out")]
    Timeout {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The platform answered with a non-success status.
    #[error("github response status error")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// HTTP status code returned.
        status: u16,
    },
    /// The response body did not match the expected shape.
    #[error("github response decode failed")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Writing downloaded bytes failed.
    #[error("github download io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl GitHubError {
    pub(crate) fn request(operation: &'static str, url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                operation,
                url: url.to_string(),
                source,
            }
        } else {
            Self::Http {
                operation,
                url: url.to_string(),
                source,
            }
        }
    }

    /// Returns `true` when the request exceeded its timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` for failures worth retrying: transport errors, timeouts,
    /// rate limiting and server-side faults.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } | Self::Timeout { .. } | Self::Io { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::ClientBuild { .. }
            | Self::InvalidToken
            | Self::InvalidUrl { .. }
            | Self::UrlNotBase { .. }
            | Self::Decode { .. } => false,
        }
    }
}
