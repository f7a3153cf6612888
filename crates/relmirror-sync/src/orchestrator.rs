//! End-to-end run: enumerate, resolve, mirror, record, persist.
//!
//! # Design
//! - The orchestrator exclusively owns the index; workers only report outcomes.
//! - Assets of one release run as separate tasks, bounded by a semaphore, and
//!   are all joined before the release is recorded and persisted.
//! - Configuration and persistence failures always end the run; other failures
//!   follow the configured [`FailurePolicy`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use relmirror_config::{
    DEFAULT_CONCURRENCY, DEFAULT_PROJECTS, DEFAULT_PUBLIC_DOMAIN, FailurePolicy, MirrorConfig,
    ReleaseMode,
};
use relmirror_github::{Asset, Release, ReleaseSource};
use relmirror_index::{Index, RecordChange};
use relmirror_storage::ObjectStore;
use relmirror_telemetry::{AssetOutcome, SyncMetrics};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span, warn};

use crate::enumerator::ReleaseEnumerator;
use crate::error::{ErrorKind, SyncError, SyncResult, error_chain};
use crate::resolver::{AssetResolver, StorageLocation};
use crate::retry::RetryPolicy;
use crate::worker::{MirrorJob, MirrorOutcome, MirrorState, MirrorWorker};

/// Behaviour of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Projects synced, in order.
    pub projects: Vec<String>,
    /// Release selection.
    pub mode: ReleaseMode,
    /// Asset transfers in flight per release; `1` is fully sequential.
    pub concurrency: usize,
    /// Retry behaviour for transient failures.
    pub retry: RetryPolicy,
    /// Handling of failing projects.
    pub failure_policy: FailurePolicy,
    /// Skip storage checks for assets already in the index.
    pub trust_index: bool,
    /// Persist the index after every release, not only at the end.
    pub persist_each_release: bool,
    /// Domain used in public URLs.
    pub public_domain: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            projects: DEFAULT_PROJECTS.iter().map(ToString::to_string).collect(),
            mode: ReleaseMode::All,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            failure_policy: FailurePolicy::IsolateProjects,
            trust_index: false,
            persist_each_release: true,
            public_domain: DEFAULT_PUBLIC_DOMAIN.to_string(),
        }
    }
}

impl SyncSettings {
    /// Settings derived from validated configuration.
    #[must_use]
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            projects: config.projects.clone(),
            mode: config.mode,
            concurrency: config.concurrency,
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                ..RetryPolicy::default()
            },
            failure_policy: config.failure_policy,
            trust_index: config.trust_index,
            persist_each_release: true,
            public_domain: config.storage.public_domain.clone(),
        }
    }
}

/// Per-project counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectStats {
    /// Project name.
    pub project: String,
    /// Releases visited.
    pub releases: usize,
    /// Assets already in storage.
    pub present: usize,
    /// Assets transferred in this run.
    pub mirrored: usize,
    /// Assets that failed.
    pub failed: usize,
    /// Bytes uploaded.
    pub bytes: u64,
}

/// A project whose sync did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFailure {
    /// Project name.
    pub project: String,
    /// Category of the failure.
    pub kind: ErrorKind,
    /// Rendered error chain.
    pub message: String,
}

/// Summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Statistics of every project attempted, in order.
    pub projects: Vec<ProjectStats>,
    /// Projects that failed under [`FailurePolicy::IsolateProjects`].
    pub failures: Vec<ProjectFailure>,
}

impl SyncReport {
    /// `true` when every project completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Assets mirrored across all projects.
    #[must_use]
    pub fn mirrored(&self) -> usize {
        self.projects.iter().map(|stats| stats.mirrored).sum()
    }

    /// Assets found present across all projects.
    #[must_use]
    pub fn present(&self) -> usize {
        self.projects.iter().map(|stats| stats.present).sum()
    }
}

/// Drives a full mirroring run.
pub struct SyncOrchestrator {
    source: Arc<dyn ReleaseSource>,
    store: Arc<dyn ObjectStore>,
    index: Arc<Index>,
    index_path: PathBuf,
    settings: SyncSettings,
    metrics: SyncMetrics,
}

impl SyncOrchestrator {
    /// Assemble an orchestrator around its collaborators and the loaded index.
    #[must_use]
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        store: Arc<dyn ObjectStore>,
        index: Index,
        index_path: impl Into<PathBuf>,
        settings: SyncSettings,
        metrics: SyncMetrics,
    ) -> Self {
        Self {
            source,
            store,
            index: Arc::new(index),
            index_path: index_path.into(),
            settings,
            metrics,
        }
    }

    /// The index as recorded so far.
    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Location the index is persisted to.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Run every configured project.
    ///
    /// # Errors
    ///
    /// Returns the first error that ends the run: configuration and
    /// persistence failures always, any failure under
    /// [`FailurePolicy::Abort`]. The index is persisted before a non-fatal
    /// error is returned.
    pub async fn run(&self) -> SyncResult<SyncReport> {
        let metadata = self
            .store
            .metadata()
            .await
            .map_err(|source| SyncError::Metadata { source })?;
        let location = Arc::new(StorageLocation::resolve(
            metadata,
            &self.settings.public_domain,
        )?);
        info!(
            bucket = %location.bucket,
            zone = %location.zone,
            projects = self.settings.projects.len(),
            mode = %self.settings.mode,
            concurrency = self.settings.concurrency,
            "sync started"
        );

        let mut worker = MirrorWorker::new(
            Arc::clone(&self.source),
            Arc::clone(&self.store),
            location,
            self.settings.retry,
        );
        if self.settings.trust_index {
            worker = worker.trusting(Arc::clone(&self.index));
        }

        let mut report = SyncReport::default();
        for project in &self.settings.projects {
            let mut stats = ProjectStats {
                project: project.clone(),
                ..ProjectStats::default()
            };
            let result = self
                .sync_project(&worker, project, &mut stats)
                .instrument(info_span!("project", project = %project))
                .await;
            report.projects.push(stats);

            let Err(err) = result else {
                continue;
            };
            if err.is_fatal() {
                return Err(err);
            }
            self.metrics.inc_project_failures();
            if self.settings.failure_policy == FailurePolicy::Abort {
                error!(
                    project = %project,
                    kind = %err.kind(),
                    error = %error_chain(&err),
                    "project failed; aborting run"
                );
                self.persist().await?;
                return Err(err);
            }
            warn!(
                project = %project,
                kind = %err.kind(),
                error = %error_chain(&err),
                "project failed; continuing with next project"
            );
            report.failures.push(ProjectFailure {
                project: project.clone(),
                kind: err.kind(),
                message: error_chain(&err),
            });
        }

        self.persist().await?;
        info!(
            mirrored = report.mirrored(),
            present = report.present(),
            failed_projects = report.failures.len(),
            entries = self.index.len(),
            "sync finished"
        );
        Ok(report)
    }

    async fn sync_project(
        &self,
        worker: &MirrorWorker,
        project: &str,
        stats: &mut ProjectStats,
    ) -> SyncResult<()> {
        let resolver = AssetResolver::new(Arc::clone(&self.source), self.settings.retry);
        let mut releases = ReleaseEnumerator::new(
            Arc::clone(&self.source),
            project,
            self.settings.mode,
            self.settings.retry,
        );
        while let Some(release) = releases.next_release().await? {
            stats.releases += 1;
            self.metrics.inc_releases();
            let assets = resolver.list_assets(project, &release).await?;
            info!(tag = %release.tag_name, assets = assets.len(), "mirroring release");

            let mirrored = self
                .mirror_release(worker, project, &release, assets, stats)
                .await;
            if self.settings.persist_each_release {
                self.persist().await?;
            }
            mirrored?;
        }
        Ok(())
    }

    async fn mirror_release(
        &self,
        worker: &MirrorWorker,
        project: &str,
        release: &Release,
        assets: Vec<Asset>,
        stats: &mut ProjectStats,
    ) -> SyncResult<()> {
        let limiter = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for asset in assets {
            let worker = worker.clone();
            let limiter = Arc::clone(&limiter);
            let span = info_span!("asset", tag = %release.tag_name, asset = %asset.name);
            let job = MirrorJob {
                project: project.to_string(),
                tag: release.tag_name.clone(),
                asset,
            };
            tasks.spawn(
                async move {
                    let _permit = limiter
                        .acquire_owned()
                        .await
                        .map_err(|source| SyncError::Limiter { source })?;
                    worker.mirror(&job).await
                }
                .instrument(span),
            );
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => self.record(outcome, stats),
                Ok(Err(err)) => {
                    stats.failed += 1;
                    self.metrics.inc_asset(AssetOutcome::Failed);
                    error!(kind = %err.kind(), error = %error_chain(&err), "asset failed");
                    first_error.get_or_insert(err);
                }
                Err(source) => {
                    stats.failed += 1;
                    self.metrics.inc_asset(AssetOutcome::Failed);
                    first_error.get_or_insert(SyncError::Task { source });
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn record(&self, outcome: MirrorOutcome, stats: &mut ProjectStats) {
        match outcome.state {
            MirrorState::Mirrored => {
                stats.mirrored += 1;
                stats.bytes += outcome.bytes;
                self.metrics.inc_asset(AssetOutcome::Mirrored);
                self.metrics.add_bytes_uploaded(outcome.bytes);
            }
            MirrorState::Present => {
                stats.present += 1;
                self.metrics.inc_asset(AssetOutcome::Present);
            }
            MirrorState::Unchecked | MirrorState::Missing => {
                warn!(
                    state = ?outcome.state,
                    url = %outcome.record.url,
                    "unfinished asset outcome; not recorded"
                );
                return;
            }
        }
        if let RecordChange::Replaced { previous } = self.index.record(outcome.record) {
            warn!(previous = %previous, "index entry replaced with a different url");
        }
    }

    async fn persist(&self) -> SyncResult<()> {
        let index = Arc::clone(&self.index);
        let path = self.index_path.clone();
        tokio::task::spawn_blocking(move || index.persist(&path))
            .await
            .map_err(|source| SyncError::Task { source })?
            .map_err(|source| SyncError::Index { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmirror_index::MirrorRecord;
    use relmirror_test_support::{MemoryStore, StaticReleases};

    fn outcome(state: MirrorState, bytes: u64) -> MirrorOutcome {
        MirrorOutcome {
            record: MirrorRecord::new(
                "qsctl",
                "v1",
                "x",
                "https://releases.pek3b.qingstor.com/qsctl/v1/x",
            ),
            state,
            bytes,
        }
    }

    #[test]
    fn only_finished_outcomes_are_recorded() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let sync = SyncOrchestrator::new(
            Arc::new(StaticReleases::new()),
            Arc::new(MemoryStore::pek3b()),
            Index::new(),
            dir.path().join("data.json"),
            SyncSettings::default(),
            SyncMetrics::new()?,
        );
        let mut stats = ProjectStats::default();

        sync.record(outcome(MirrorState::Missing, 0), &mut stats);
        sync.record(outcome(MirrorState::Unchecked, 0), &mut stats);
        assert_eq!(stats, ProjectStats::default());
        assert!(sync.index().is_empty());

        sync.record(outcome(MirrorState::Present, 0), &mut stats);
        assert_eq!(stats.present, 1);
        sync.record(outcome(MirrorState::Mirrored, 7), &mut stats);
        assert_eq!((stats.mirrored, stats.bytes), (1, 7));
        assert!(sync.index().contains("qsctl", "v1", "x"));
        Ok(())
    }
}
