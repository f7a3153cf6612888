//! Trait implemented by hosting-platform adapters.

use async_trait::async_trait;
use tokio::fs::File;

use crate::error::GitHubResult;
use crate::model::{Asset, Release, ReleasePage};

/// Read access to a project's releases and their asset bytes.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch one page of releases, newest first in platform order.
    async fn list_releases(&self, project: &str, page: u32) -> GitHubResult<ReleasePage>;

    /// Fetch the latest published release.
    async fn latest_release(&self, project: &str) -> GitHubResult<Release>;

    /// List the assets attached to a release, a single page of at most `per_page`.
    async fn list_release_assets(
        &self,
        project: &str,
        release_id: u64,
        per_page: u32,
    ) -> GitHubResult<Vec<Asset>>;

    /// Stream the asset bytes into `destination`, returning the byte count.
    async fn download_asset(&self, asset: &Asset, destination: &mut File) -> GitHubResult<u64>;
}
