//! # Design
//!
//! - Messages stay constant; the metric name or file path rides along as a
//!   field so callers can log it structurally.

use std::path::PathBuf;
use std::string::FromUtf8Error;

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while setting up logging or exporting run metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed, or installation failed.
    #[error("tracing subscriber could not be installed")]
    LoggerInstall {
        /// Underlying subscriber error.
        source: TryInitError,
    },
    /// A run collector could not be created or registered.
    #[error("metrics collector setup failed")]
    CollectorSetup {
        /// Metric the failure concerns.
        name: &'static str,
        /// Underlying prometheus error.
        source: prometheus::Error,
    },
    /// The registry could not be rendered in the text exposition format.
    #[error("metrics rendering failed")]
    Render {
        /// Underlying prometheus error.
        source: prometheus::Error,
    },
    /// The rendered exposition was not UTF-8.
    #[error("metrics rendering produced invalid utf-8")]
    RenderEncoding {
        /// Underlying conversion error.
        source: FromUtf8Error,
    },
    /// The metrics textfile could not be written.
    #[error("metrics textfile write failed")]
    Textfile {
        /// Destination of the textfile.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn textfile_error_keeps_path_and_source() {
        let err = TelemetryError::Textfile {
            path: PathBuf::from("relmirror.prom"),
            source: io::Error::other("read-only filesystem"),
        };
        assert_eq!(err.to_string(), "metrics textfile write failed");
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("read-only filesystem")
        );
    }

    #[test]
    fn collector_error_names_the_metric() {
        let err = TelemetryError::CollectorSetup {
            name: "relmirror_assets_total",
            source: prometheus::Error::AlreadyReg,
        };
        assert!(matches!(
            err,
            TelemetryError::CollectorSetup {
                name: "relmirror_assets_total",
                ..
            }
        ));
        assert!(err.source().is_some());
    }
}
