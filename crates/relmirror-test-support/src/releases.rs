//! Scripted [`ReleaseSource`] backed by in-memory fixtures.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use relmirror_github::{Asset, GitHubError, GitHubResult, Release, ReleasePage, ReleaseSource};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Default)]
struct Project {
    pages: Vec<Vec<Release>>,
    links: BTreeMap<u32, Option<u32>>,
    latest: Option<Release>,
    assets: BTreeMap<u64, Vec<Asset>>,
    failure: Option<u16>,
}

#[derive(Debug, Default)]
struct Calls {
    pages: Vec<(String, u32)>,
    latest: Vec<String>,
    asset_lists: Vec<(String, u64, u32)>,
    downloads: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    projects: BTreeMap<String, Project>,
    downloads: BTreeMap<String, Vec<u8>>,
    download_failures: BTreeMap<String, VecDeque<u16>>,
    calls: Calls,
}

/// Release source fake with call recording.
#[derive(Debug, Default)]
pub struct StaticReleases {
    state: Mutex<State>,
}

impl StaticReleases {
    /// Empty source; every project lookup answers `404`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a release carrying `(filename, content)` assets to the last
    /// page of `project`.
    ///
    /// Asset URLs are synthesised and serve the given content. The first
    /// release added becomes the latest one.
    #[must_use]
    pub fn with_release(self, project: &str, release: Release, assets: &[(&str, &str)]) -> Self {
        {
            let mut state = self.lock();
            let mut listed = Vec::with_capacity(assets.len());
            for (name, content) in assets {
                let url = format!(
                    "https://github.invalid/{project}/releases/download/{}/{name}",
                    release.tag_name
                );
                state.downloads.insert(url.clone(), content.as_bytes().to_vec());
                let mut asset = Asset::new(*name, url);
                asset.size = content.len() as u64;
                listed.push(asset);
            }
            let entry = state.projects.entry(project.to_string()).or_default();
            entry.assets.insert(release.id, listed);
            if entry.latest.is_none() {
                entry.latest = Some(release.clone());
            }
            match entry.pages.last_mut() {
                Some(page) => page.push(release),
                None => entry.pages.push(vec![release]),
            }
        }
        self
    }

    /// Start a new release page for `project`.
    #[must_use]
    pub fn with_page_break(self, project: &str) -> Self {
        self.lock()
            .projects
            .entry(project.to_string())
            .or_default()
            .pages
            .push(Vec::new());
        self
    }

    /// Attach an explicit asset list to a release, replacing synthesised ones.
    #[must_use]
    pub fn with_assets(self, project: &str, release_id: u64, assets: Vec<Asset>) -> Self {
        self.lock()
            .projects
            .entry(project.to_string())
            .or_default()
            .assets
            .insert(release_id, assets);
        self
    }

    /// Override the `next_page` reported for `page` of `project`.
    #[must_use]
    pub fn with_page_link(self, project: &str, page: u32, next: Option<u32>) -> Self {
        self.lock()
            .projects
            .entry(project.to_string())
            .or_default()
            .links
            .insert(page, next);
        self
    }

    /// Make every listing call for `project` fail with `status`.
    #[must_use]
    pub fn with_project_failure(self, project: &str, status: u16) -> Self {
        self.lock()
            .projects
            .entry(project.to_string())
            .or_default()
            .failure = Some(status);
        self
    }

    /// Make the next `count` downloads of `url` fail with `status`.
    #[must_use]
    pub fn with_download_failures(self, url: &str, count: usize, status: u16) -> Self {
        self.lock()
            .download_failures
            .entry(url.to_string())
            .or_default()
            .extend(std::iter::repeat_n(status, count));
        self
    }

    /// Pages requested through `list_releases`, in call order.
    #[must_use]
    pub fn page_calls(&self) -> Vec<(String, u32)> {
        self.lock().calls.pages.clone()
    }

    /// Projects passed to `latest_release`, in call order.
    #[must_use]
    pub fn latest_calls(&self) -> Vec<String> {
        self.lock().calls.latest.clone()
    }

    /// `(project, release_id, per_page)` of every asset listing.
    #[must_use]
    pub fn asset_list_calls(&self) -> Vec<(String, u64, u32)> {
        self.lock().calls.asset_lists.clone()
    }

    /// URLs downloaded, in call order, including failed attempts.
    #[must_use]
    pub fn download_calls(&self) -> Vec<String> {
        self.lock().calls.downloads.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn status(operation: &'static str, url: String, status: u16) -> GitHubError {
    GitHubError::Status {
        operation,
        url,
        status,
    }
}

fn lookup<'a>(
    state: &'a State,
    operation: &'static str,
    name: &str,
) -> GitHubResult<&'a Project> {
    let url = format!("https://api.github.invalid/repos/{name}");
    match state.projects.get(name) {
        Some(Project {
            failure: Some(code),
            ..
        }) => Err(status(operation, url, *code)),
        Some(project) => Ok(project),
        None => Err(status(operation, url, 404)),
    }
}

#[async_trait]
impl ReleaseSource for StaticReleases {
    async fn list_releases(&self, name: &str, page: u32) -> GitHubResult<ReleasePage> {
        let mut state = self.lock();
        state.calls.pages.push((name.to_string(), page));
        let project = lookup(&state, "list_releases", name)?;
        let index = usize::try_from(page.saturating_sub(1)).unwrap_or(usize::MAX);
        let releases = project.pages.get(index).cloned().unwrap_or_default();
        let next_page = project.links.get(&page).copied().unwrap_or_else(|| {
            let pages = u32::try_from(project.pages.len()).unwrap_or(u32::MAX);
            (page < pages).then_some(page + 1)
        });
        Ok(ReleasePage {
            releases,
            next_page,
        })
    }

    async fn latest_release(&self, name: &str) -> GitHubResult<Release> {
        let mut state = self.lock();
        state.calls.latest.push(name.to_string());
        lookup(&state, "latest_release", name)?
            .latest
            .clone()
            .ok_or_else(|| status("latest_release", format!("{name}/latest"), 404))
    }

    async fn list_release_assets(
        &self,
        name: &str,
        release_id: u64,
        per_page: u32,
    ) -> GitHubResult<Vec<Asset>> {
        let mut state = self.lock();
        state
            .calls
            .asset_lists
            .push((name.to_string(), release_id, per_page));
        Ok(lookup(&state, "list_release_assets", name)?
            .assets
            .get(&release_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn download_asset(&self, asset: &Asset, destination: &mut File) -> GitHubResult<u64> {
        let url = asset.browser_download_url.clone();
        let bytes = {
            let mut state = self.lock();
            state.calls.downloads.push(url.clone());
            if let Some(code) = state
                .download_failures
                .get_mut(&url)
                .and_then(VecDeque::pop_front)
            {
                return Err(status("download_asset", url, code));
            }
            state.downloads.get(&url).cloned()
        };
        let bytes = bytes.ok_or_else(|| status("download_asset", url.clone(), 404))?;
        let io_error = |source| GitHubError::Io {
            operation: "download_asset",
            source,
        };
        destination.write_all(&bytes).await.map_err(io_error)?;
        destination.flush().await.map_err(io_error)?;
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pages_follow_breaks_and_report_next() -> GitHubResult<()> {
        let source = StaticReleases::new()
            .with_release("qsctl", Release::new(3, "v3"), &[])
            .with_page_break("qsctl")
            .with_release("qsctl", Release::new(2, "v2"), &[])
            .with_page_break("qsctl")
            .with_release("qsctl", Release::new(1, "v1"), &[]);

        let first = source.list_releases("qsctl", 1).await?;
        assert_eq!(first.next_page, Some(2));
        assert_eq!(source.list_releases("qsctl", 3).await?.next_page, None);
        assert_eq!(source.latest_release("qsctl").await?.tag_name, "v3");
        assert!(source.list_releases("missing", 1).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn downloads_serve_fixture_bytes() -> anyhow::Result<()> {
        let source =
            StaticReleases::new().with_release("demo", Release::new(1, "v1.0.0"), &[("a", "xyz")]);
        let assets = source.list_release_assets("demo", 1, 100).await?;
        let mut file = File::from_std(tempfile::tempfile()?);
        assert_eq!(source.download_asset(&assets[0], &mut file).await?, 3);
        assert_eq!(source.download_calls(), [assets[0].browser_download_url.clone()]);
        Ok(())
    }
}
