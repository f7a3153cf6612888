//! Prometheus-backed counters for a mirroring run.
//!
//! # Design
//! - Each run owns a private registry; nothing is registered globally.
//! - Output is the Prometheus text format, optionally written as a textfile
//!   for node-exporter style collection after the process exits.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::{Result, TelemetryError};

/// Final state of one asset in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOutcome {
    /// Already in storage; nothing transferred.
    Present,
    /// Downloaded and uploaded during this run.
    Mirrored,
    /// The transfer or existence check failed.
    Failed,
}

impl AssetOutcome {
    /// Label value used in the `outcome` dimension.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Mirrored => "mirrored",
            Self::Failed => "failed",
        }
    }
}

/// Counters describing one mirroring run.
#[derive(Clone)]
pub struct SyncMetrics {
    inner: Arc<SyncMetricsInner>,
}

struct SyncMetricsInner {
    registry: Registry,
    assets_total: IntCounterVec,
    bytes_uploaded_total: IntCounter,
    releases_total: IntCounter,
    project_failures_total: IntCounter,
}

/// Point-in-time copy of the run counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Assets found already mirrored.
    pub assets_present: u64,
    /// Assets transferred this run.
    pub assets_mirrored: u64,
    /// Assets whose processing failed.
    pub assets_failed: u64,
    /// Bytes uploaded to storage.
    pub bytes_uploaded: u64,
    /// Releases visited.
    pub releases: u64,
    /// Projects that failed.
    pub project_failures: u64,
}

impl SyncMetrics {
    /// Build a registry with the run collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be created or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let assets_total = IntCounterVec::new(
            Opts::new("relmirror_assets_total", "Assets processed by outcome"),
            &["outcome"],
        )
        .map_err(register_error("relmirror_assets_total"))?;
        let bytes_uploaded_total = IntCounter::with_opts(Opts::new(
            "relmirror_bytes_uploaded_total",
            "Bytes uploaded to object storage",
        ))
        .map_err(register_error("relmirror_bytes_uploaded_total"))?;
        let releases_total = IntCounter::with_opts(Opts::new(
            "relmirror_releases_total",
            "Releases visited",
        ))
        .map_err(register_error("relmirror_releases_total"))?;
        let project_failures_total = IntCounter::with_opts(Opts::new(
            "relmirror_project_failures_total",
            "Projects whose sync failed",
        ))
        .map_err(register_error("relmirror_project_failures_total"))?;

        registry
            .register(Box::new(assets_total.clone()))
            .map_err(register_error("relmirror_assets_total"))?;
        registry
            .register(Box::new(bytes_uploaded_total.clone()))
            .map_err(register_error("relmirror_bytes_uploaded_total"))?;
        registry
            .register(Box::new(releases_total.clone()))
            .map_err(register_error("relmirror_releases_total"))?;
        registry
            .register(Box::new(project_failures_total.clone()))
            .map_err(register_error("relmirror_project_failures_total"))?;

        Ok(Self {
            inner: Arc::new(SyncMetricsInner {
                registry,
                assets_total,
                bytes_uploaded_total,
                releases_total,
                project_failures_total,
            }),
        })
    }

    /// Count one asset with the given outcome.
    pub fn inc_asset(&self, outcome: AssetOutcome) {
        self.inner
            .assets_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Add uploaded bytes.
    pub fn add_bytes_uploaded(&self, bytes: u64) {
        self.inner.bytes_uploaded_total.inc_by(bytes);
    }

    /// Count a visited release.
    pub fn inc_releases(&self) {
        self.inner.releases_total.inc();
    }

    /// Count a failed project.
    pub fn inc_project_failures(&self) {
        self.inner.project_failures_total.inc();
    }

    /// Copy the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let assets = |outcome: AssetOutcome| {
            self.inner
                .assets_total
                .with_label_values(&[outcome.as_str()])
                .get()
        };
        MetricsSnapshot {
            assets_present: assets(AssetOutcome::Present),
            assets_mirrored: assets(AssetOutcome::Mirrored),
            assets_failed: assets(AssetOutcome::Failed),
            bytes_uploaded: self.inner.bytes_uploaded_total.get(),
            releases: self.inner.releases_total.get(),
            project_failures: self.inner.project_failures_total.get(),
        }
    }

    /// Render all collectors in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderEncoding { source })
    }

    /// Write the rendered metrics to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let rendered = self.render()?;
        let write_error = |source| TelemetryError::Textfile {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        fs::write(path, rendered).map_err(write_error)
    }
}

fn register_error(name: &'static str) -> impl Fn(prometheus::Error) -> TelemetryError {
    move |source| TelemetryError::CollectorSetup { name, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_into_snapshot() -> Result<()> {
        let metrics = SyncMetrics::new()?;
        metrics.inc_asset(AssetOutcome::Present);
        metrics.inc_asset(AssetOutcome::Mirrored);
        metrics.inc_asset(AssetOutcome::Mirrored);
        metrics.inc_asset(AssetOutcome::Failed);
        metrics.add_bytes_uploaded(2048);
        metrics.inc_releases();
        metrics.inc_project_failures();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.assets_present, 1);
        assert_eq!(snapshot.assets_mirrored, 2);
        assert_eq!(snapshot.assets_failed, 1);
        assert_eq!(snapshot.bytes_uploaded, 2048);
        assert_eq!(snapshot.releases, 1);
        assert_eq!(snapshot.project_failures, 1);
        Ok(())
    }

    #[test]
    fn clones_share_counters() -> Result<()> {
        let metrics = SyncMetrics::new()?;
        metrics.clone().inc_releases();
        assert_eq!(metrics.snapshot().releases, 1);
        Ok(())
    }

    #[test]
    fn render_and_write_textfile() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let metrics = SyncMetrics::new()?;
        metrics.inc_asset(AssetOutcome::Mirrored);
        metrics.add_bytes_uploaded(10);

        let rendered = metrics.render()?;
        assert!(rendered.contains("relmirror_assets_total{outcome=\"mirrored\"} 1"));
        assert!(rendered.contains("relmirror_bytes_uploaded_total 10"));

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("textfiles").join("relmirror.prom");
        metrics.write_textfile(&path)?;
        assert_eq!(std::fs::read_to_string(&path)?, rendered);
        Ok(())
    }
}
