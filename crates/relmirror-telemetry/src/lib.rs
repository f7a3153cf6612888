#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Telemetry primitives for relmirror runs.
//!
//! Layout: `init.rs` (subscriber installation), `context.rs` (run span),
//! `metrics.rs` (Prometheus counters and textfile export), `error.rs`.

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::RunContext;
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
pub use metrics::{AssetOutcome, MetricsSnapshot, SyncMetrics};
