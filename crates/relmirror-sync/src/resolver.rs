//! Asset listing, target paths and public URLs.

use std::sync::Arc;

use relmirror_github::{Asset, Release, ReleaseSource};
use relmirror_storage::{DEFAULT_HOST, StorageMetadata};
use tracing::warn;

use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;

/// Assets requested per release; later assets are not mirrored.
pub const ASSET_PAGE_SIZE: u32 = 100;

/// Storage path of an asset: `{project}/{tag}/{filename}`.
#[must_use]
pub fn target_path(project: &str, tag: &str, filename: &str) -> String {
    format!("{project}/{tag}/{filename}")
}

/// Bucket identity used to build public URLs for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    /// Bucket name.
    pub bucket: String,
    /// Bucket zone.
    pub zone: String,
    /// Service domain, normally `qingstor.com`.
    pub domain: String,
}

impl StorageLocation {
    /// Build the location from backend metadata.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Location`] when the backend reports no zone.
    pub fn resolve(metadata: StorageMetadata, domain: &str) -> SyncResult<Self> {
        let zone = metadata
            .location
            .filter(|zone| !zone.trim().is_empty())
            .ok_or_else(|| SyncError::Location {
                bucket: metadata.name.clone(),
            })?;
        let domain = if domain.is_empty() { DEFAULT_HOST } else { domain };
        Ok(Self {
            bucket: metadata.name,
            zone,
            domain: domain.to_string(),
        })
    }
}

/// Public URL of `target_path` in `location`.
#[must_use]
pub fn public_url(location: &StorageLocation, target_path: &str) -> String {
    format!(
        "https://{}.{}.{}/{target_path}",
        location.bucket, location.zone, location.domain
    )
}

/// Lists the assets of a release, capped at [`ASSET_PAGE_SIZE`].
#[derive(Clone)]
pub struct AssetResolver {
    source: Arc<dyn ReleaseSource>,
    retry: RetryPolicy,
}

impl AssetResolver {
    /// Resolver reading from `source`.
    #[must_use]
    pub fn new(source: Arc<dyn ReleaseSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// Assets of `release`, from a single request of at most
    /// [`ASSET_PAGE_SIZE`] entries.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Source`] when the listing fails.
    pub async fn list_assets(&self, project: &str, release: &Release) -> SyncResult<Vec<Asset>> {
        let source = &self.source;
        let mut assets = self
            .retry
            .run("list_release_assets", || {
                source.list_release_assets(project, release.id, ASSET_PAGE_SIZE)
            })
            .await
            .map_err(|source| SyncError::Source {
                project: project.to_string(),
                source,
            })?;
        let limit = ASSET_PAGE_SIZE as usize;
        if assets.len() > limit {
            warn!(
                project,
                tag = %release.tag_name,
                listed = assets.len(),
                limit,
                "release lists more assets than one page; extra assets are not mirrored"
            );
            assets.truncate(limit);
        }
        Ok(assets)
    }
}
