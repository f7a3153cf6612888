//! Per-asset mirroring state machine.
//!
//! # Design
//! - `Unchecked -> Present | Missing -> Mirrored`.
//! - Only `StorageError::NotFound` means missing; every other stat failure is
//!   returned as is and no upload happens.
//! - Each transfer attempt owns a named scratch file in the scratch directory
//!   that is deleted when the attempt ends, whatever the outcome.
//! - The worker reports outcomes; recording and persisting belong to the caller.

use std::path::PathBuf;
use std::sync::Arc;

use relmirror_github::{Asset, ReleaseSource};
use relmirror_index::{Index, MirrorRecord};
use relmirror_storage::ObjectStore;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::resolver::{StorageLocation, public_url, target_path};
use crate::retry::RetryPolicy;

/// Prefix of scratch files holding downloads in flight.
pub const SCRATCH_PREFIX: &str = "release-";

/// Where an asset stands in the mirroring state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    /// Nothing is known yet.
    Unchecked,
    /// The object already exists in storage.
    Present,
    /// Storage reported the object as not found.
    Missing,
    /// The object was downloaded and uploaded in this run.
    Mirrored,
}

/// One asset of one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorJob {
    /// Project the release belongs to.
    pub project: String,
    /// Release tag.
    pub tag: String,
    /// Asset to mirror.
    pub asset: Asset,
}

/// Result of a successful worker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorOutcome {
    /// Entry to record in the index.
    pub record: MirrorRecord,
    /// Final state, either `Present` or `Mirrored`.
    pub state: MirrorState,
    /// Bytes uploaded; zero unless `Mirrored`.
    pub bytes: u64,
}

/// Runs the mirroring state machine for individual assets.
#[derive(Clone)]
pub struct MirrorWorker {
    source: Arc<dyn ReleaseSource>,
    store: Arc<dyn ObjectStore>,
    location: Arc<StorageLocation>,
    retry: RetryPolicy,
    trusted_index: Option<Arc<Index>>,
    scratch_dir: PathBuf,
}

impl MirrorWorker {
    /// Worker reading from `source` and writing to `store`.
    #[must_use]
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        store: Arc<dyn ObjectStore>,
        location: Arc<StorageLocation>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            store,
            location,
            retry,
            trusted_index: None,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Create scratch files in `dir` instead of the system temp directory.
    #[must_use]
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Treat assets already in `index` as present without asking storage.
    #[must_use]
    pub fn trusting(mut self, index: Arc<Index>) -> Self {
        self.trusted_index = Some(index);
        self
    }

    /// Drive `job` to `Present` or `Mirrored`.
    ///
    /// # Errors
    ///
    /// Returns an error when the existence check fails for any reason other
    /// than "not found", or when the download or upload fails.
    pub async fn mirror(&self, job: &MirrorJob) -> SyncResult<MirrorOutcome> {
        let path = target_path(&job.project, &job.tag, &job.asset.name);
        let record = MirrorRecord::new(
            &job.project,
            &job.tag,
            &job.asset.name,
            public_url(&self.location, &path),
        );

        if self
            .trusted_index
            .as_ref()
            .is_some_and(|index| index.contains(&job.project, &job.tag, &job.asset.name))
        {
            debug!(path = %path, "asset already indexed; skipping storage check");
            return Ok(present(record));
        }

        debug!(path = %path, "checking object existence");
        let state = self.check(&path).await?;
        if state == MirrorState::Present {
            info!(path = %path, "object already in storage");
            return Ok(present(record));
        }
        debug!(path = %path, state = ?state, "transferring asset");

        let bytes = self
            .retry
            .run("mirror_asset", || self.transfer(job, &path))
            .await?;
        info!(path = %path, bytes, "asset mirrored");
        Ok(MirrorOutcome {
            record,
            state: MirrorState::Mirrored,
            bytes,
        })
    }

    async fn check(&self, path: &str) -> SyncResult<MirrorState> {
        let store = &self.store;
        match self.retry.run("stat", || store.stat(path)).await {
            Ok(_) => Ok(MirrorState::Present),
            Err(err) if err.is_not_found() => Ok(MirrorState::Missing),
            Err(source) => Err(SyncError::Storage {
                path: path.to_string(),
                source,
            }),
        }
    }

    async fn transfer(&self, job: &MirrorJob, path: &str) -> SyncResult<u64> {
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempfile_in(&self.scratch_dir)
            .map_err(SyncError::scratch("create"))?;
        let handle = scratch
            .as_file()
            .try_clone()
            .map_err(SyncError::scratch("open"))?;
        let mut file = File::from_std(handle);

        info!(path = %path, url = %job.asset.browser_download_url, "downloading asset");
        let bytes = self
            .source
            .download_asset(&job.asset, &mut file)
            .await
            .map_err(|source| SyncError::Source {
                project: job.project.clone(),
                source,
            })?;
        file.flush().await.map_err(SyncError::scratch("flush"))?;
        file.sync_all().await.map_err(SyncError::scratch("sync"))?;
        file.rewind().await.map_err(SyncError::scratch("rewind"))?;

        info!(path = %path, bytes, "uploading asset");
        self.store
            .write(path, file, bytes)
            .await
            .map_err(|source| SyncError::Storage {
                path: path.to_string(),
                source,
            })?;
        drop(scratch);
        Ok(bytes)
    }
}

const fn present(record: MirrorRecord) -> MirrorOutcome {
    MirrorOutcome {
        record,
        state: MirrorState::Present,
        bytes: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmirror_github::{GitHubError, Release};
    use std::path::Path;
    use std::time::Duration;
    use relmirror_storage::StorageError;
    use relmirror_test_support::{MemoryStore, StaticReleases};

    fn location() -> Arc<StorageLocation> {
        Arc::new(StorageLocation {
            bucket: "releases".to_string(),
            zone: "pek3b".to_string(),
            domain: "qingstor.com".to_string(),
        })
    }

    fn demo_source() -> Arc<StaticReleases> {
        Arc::new(StaticReleases::new().with_release(
            "demo",
            Release::new(1, "v1.0.0"),
            &[("demo.zip", "zip-bytes")],
        ))
    }

    const DEMO_URL: &str = "https://github.invalid/demo/releases/download/v1.0.0/demo.zip";

    fn demo_source_failing(count: usize, status: u16) -> Arc<StaticReleases> {
        Arc::new(
            StaticReleases::new()
                .with_release("demo", Release::new(1, "v1.0.0"), &[("demo.zip", "zip-bytes")])
                .with_download_failures(DEMO_URL, count, status),
        )
    }

    fn leftover_scratch(dir: &Path) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with(SCRATCH_PREFIX) {
                names.push(name);
            }
        }
        Ok(names)
    }

    async fn demo_job(source: &StaticReleases) -> anyhow::Result<MirrorJob> {
        let asset = source
            .list_release_assets("demo", 1, 100)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("fixture asset"))?;
        Ok(MirrorJob {
            project: "demo".to_string(),
            tag: "v1.0.0".to_string(),
            asset,
        })
    }

    #[tokio::test]
    async fn missing_object_is_downloaded_and_uploaded() -> anyhow::Result<()> {
        let source = demo_source();
        let store = Arc::new(MemoryStore::pek3b());
        let worker = MirrorWorker::new(
            source.clone(),
            store.clone(),
            location(),
            RetryPolicy::none(),
        );

        let outcome = worker.mirror(&demo_job(&source).await?).await?;
        assert_eq!(outcome.state, MirrorState::Mirrored);
        assert_eq!(outcome.bytes, 9);
        assert_eq!(
            outcome.record.url,
            "https://releases.pek3b.qingstor.com/demo/v1.0.0/demo.zip"
        );
        assert_eq!(store.write_calls(), ["demo/v1.0.0/demo.zip"]);
        assert_eq!(store.object("demo/v1.0.0/demo.zip").as_deref(), Some(&b"zip-bytes"[..]));
        Ok(())
    }

    #[tokio::test]
    async fn present_object_is_never_downloaded() -> anyhow::Result<()> {
        let source = demo_source();
        let store = Arc::new(MemoryStore::pek3b());
        store.insert("demo/v1.0.0/demo.zip", b"zip-bytes");
        let worker = MirrorWorker::new(
            source.clone(),
            store.clone(),
            location(),
            RetryPolicy::none(),
        );

        let outcome = worker.mirror(&demo_job(&source).await?).await?;
        assert_eq!(outcome.state, MirrorState::Present);
        assert_eq!(outcome.bytes, 0);
        assert!(source.download_calls().is_empty());
        assert!(store.write_calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn stat_failure_is_not_treated_as_missing() -> anyhow::Result<()> {
        let source = demo_source();
        let store = Arc::new(MemoryStore::pek3b());
        store.fail_stat_under("demo/", 403);
        let worker = MirrorWorker::new(
            source.clone(),
            store.clone(),
            location(),
            RetryPolicy::default(),
        );

        let result = worker.mirror(&demo_job(&source).await?).await;
        assert!(matches!(
            result,
            Err(SyncError::Storage {
                source: StorageError::Status { status: 403, .. },
                ..
            })
        ));
        assert_eq!(store.stat_calls().len(), 1);
        assert!(source.download_calls().is_empty());
        assert!(store.write_calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn trusted_index_skips_storage() -> anyhow::Result<()> {
        let source = demo_source();
        let store = Arc::new(MemoryStore::pek3b());
        let index = Arc::new(Index::new());
        index.record(MirrorRecord::new(
            "demo",
            "v1.0.0",
            "demo.zip",
            "https://releases.pek3b.qingstor.com/demo/v1.0.0/demo.zip",
        ));
        let worker = MirrorWorker::new(
            source.clone(),
            store.clone(),
            location(),
            RetryPolicy::none(),
        )
            .trusting(index);

        let outcome = worker.mirror(&demo_job(&source).await?).await?;
        assert_eq!(outcome.state, MirrorState::Present);
        assert!(store.stat_calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_upload_restarts_the_transfer() -> anyhow::Result<()> {
        let source = demo_source();
        let store = Arc::new(MemoryStore::pek3b());
        store.fail_next_writes(1, 503);
        let retry = RetryPolicy {
            max_attempts: 2,
            base_delay: std::time::Duration::from_millis(1),
        };
        let worker = MirrorWorker::new(source.clone(), store.clone(), location(), retry);

        let outcome = worker.mirror(&demo_job(&source).await?).await?;
        assert_eq!(outcome.state, MirrorState::Mirrored);
        assert_eq!(source.download_calls().len(), 2);
        assert_eq!(store.write_calls().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn failed_download_uploads_nothing() -> anyhow::Result<()> {
        let source = demo_source_failing(5, 404);
        let store = Arc::new(MemoryStore::pek3b());
        let scratch = tempfile::tempdir()?;
        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        let worker = MirrorWorker::new(source.clone(), store.clone(), location(), retry)
            .scratch_dir(scratch.path());

        let result = worker.mirror(&demo_job(&source).await?).await;
        assert!(matches!(
            result,
            Err(SyncError::Source {
                source: GitHubError::Status { status: 404, .. },
                ..
            })
        ));
        assert_eq!(source.download_calls(), [DEMO_URL]);
        assert!(store.write_calls().is_empty());
        assert!(store.object("demo/v1.0.0/demo.zip").is_none());
        assert!(leftover_scratch(scratch.path())?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn transient_download_failure_is_retried() -> anyhow::Result<()> {
        let source = demo_source_failing(1, 503);
        let store = Arc::new(MemoryStore::pek3b());
        let scratch = tempfile::tempdir()?;
        let retry = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        };
        let worker = MirrorWorker::new(source.clone(), store.clone(), location(), retry)
            .scratch_dir(scratch.path());

        let outcome = worker.mirror(&demo_job(&source).await?).await?;
        assert_eq!(outcome.state, MirrorState::Mirrored);
        assert_eq!(source.download_calls().len(), 2);
        assert_eq!(store.write_calls(), ["demo/v1.0.0/demo.zip"]);
        assert!(leftover_scratch(scratch.path())?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn scratch_files_are_removed_after_upload_failure() -> anyhow::Result<()> {
        let source = demo_source();
        let store = Arc::new(MemoryStore::pek3b());
        store.fail_next_writes(1, 403);
        let scratch = tempfile::tempdir()?;
        let worker = MirrorWorker::new(
            source.clone(),
            store.clone(),
            location(),
            RetryPolicy::none(),
        )
        .scratch_dir(scratch.path());

        let result = worker.mirror(&demo_job(&source).await?).await;
        assert!(result.is_err());
        assert_eq!(source.download_calls().len(), 1);
        assert!(leftover_scratch(scratch.path())?.is_empty());
        Ok(())
    }
}
