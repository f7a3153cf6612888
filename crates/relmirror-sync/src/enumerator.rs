//! Lazy release enumeration for one project.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use relmirror_config::ReleaseMode;
use relmirror_github::{Release, ReleaseSource};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;

/// Yields the releases of a project, one at a time, fetching pages on demand.
///
/// The sequence is finite and cannot be restarted. Every page is requested at
/// most once, even when the platform reports a page again as the next one.
pub struct ReleaseEnumerator {
    source: Arc<dyn ReleaseSource>,
    project: String,
    mode: ReleaseMode,
    retry: RetryPolicy,
    buffered: VecDeque<Release>,
    pending_page: Option<u32>,
    fetched_pages: BTreeSet<u32>,
}

impl ReleaseEnumerator {
    /// Enumerate `project` in `mode`.
    #[must_use]
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        project: impl Into<String>,
        mode: ReleaseMode,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            project: project.into(),
            mode,
            retry,
            buffered: VecDeque::new(),
            pending_page: Some(1),
            fetched_pages: BTreeSet::new(),
        }
    }

    /// Next release, or `None` once the sequence is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Source`] when the platform cannot be queried.
    pub async fn next_release(&mut self) -> SyncResult<Option<Release>> {
        loop {
            if let Some(release) = self.buffered.pop_front() {
                return Ok(Some(release));
            }
            let Some(page) = self.pending_page.take() else {
                return Ok(None);
            };
            match self.mode {
                ReleaseMode::Latest => return self.fetch_latest().await.map(Some),
                ReleaseMode::All => self.fetch_page(page).await?,
            }
        }
    }

    async fn fetch_latest(&self) -> SyncResult<Release> {
        let source = &self.source;
        let project = self.project.as_str();
        let release = self
            .retry
            .run("latest_release", || source.latest_release(project))
            .await
            .map_err(|source| SyncError::Source {
                project: project.to_string(),
                source,
            })?;
        debug!(project, tag = %release.tag_name, "latest release resolved");
        Ok(release)
    }

    async fn fetch_page(&mut self, page: u32) -> SyncResult<()> {
        if !self.fetched_pages.insert(page) {
            warn!(
                project = %self.project,
                page,
                "release page already visited; stopping pagination"
            );
            return Ok(());
        }
        let source = &self.source;
        let project = self.project.as_str();
        let listed = self
            .retry
            .run("list_releases", || source.list_releases(project, page))
            .await
            .map_err(|source| SyncError::Source {
                project: project.to_string(),
                source,
            })?;
        debug!(
            project,
            page,
            releases = listed.releases.len(),
            next_page = ?listed.next_page,
            "release page fetched"
        );
        self.buffered.extend(listed.releases);
        self.pending_page = listed.next_page;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmirror_test_support::StaticReleases;

    async fn drain(enumerator: &mut ReleaseEnumerator) -> SyncResult<Vec<String>> {
        let mut tags = Vec::new();
        while let Some(release) = enumerator.next_release().await? {
            tags.push(release.tag_name);
        }
        Ok(tags)
    }

    fn three_pages() -> StaticReleases {
        StaticReleases::new()
            .with_release("qsctl", Release::new(3, "v1.2.0"), &[])
            .with_page_break("qsctl")
            .with_release("qsctl", Release::new(2, "v1.1.0"), &[])
            .with_page_break("qsctl")
            .with_release("qsctl", Release::new(1, "v1.0.0"), &[])
    }

    #[tokio::test]
    async fn all_mode_visits_every_page_once() -> SyncResult<()> {
        let source = Arc::new(three_pages());
        let mut enumerator =
            ReleaseEnumerator::new(source.clone(), "qsctl", ReleaseMode::All, RetryPolicy::none());

        assert_eq!(drain(&mut enumerator).await?, ["v1.2.0", "v1.1.0", "v1.0.0"]);
        assert!(enumerator.next_release().await?.is_none());
        let pages: Vec<u32> = source.page_calls().into_iter().map(|(_, page)| page).collect();
        assert_eq!(pages, [1, 2, 3]);
        Ok(())
    }

    #[tokio::test]
    async fn latest_mode_yields_exactly_one_release() -> SyncResult<()> {
        let source = Arc::new(three_pages());
        let mut enumerator = ReleaseEnumerator::new(
            source.clone(),
            "qsctl",
            ReleaseMode::Latest,
            RetryPolicy::none(),
        );

        assert_eq!(drain(&mut enumerator).await?, ["v1.2.0"]);
        assert_eq!(source.latest_calls().len(), 1);
        assert!(source.page_calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn cyclic_next_page_is_not_refetched() -> SyncResult<()> {
        let source = Arc::new(three_pages().with_page_link("qsctl", 3, Some(1)));
        let mut enumerator =
            ReleaseEnumerator::new(source.clone(), "qsctl", ReleaseMode::All, RetryPolicy::none());

        assert_eq!(drain(&mut enumerator).await?.len(), 3);
        assert_eq!(source.page_calls().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn platform_errors_name_the_project() {
        let source = Arc::new(StaticReleases::new().with_project_failure("qsctl", 502));
        let mut enumerator =
            ReleaseEnumerator::new(source, "qsctl", ReleaseMode::All, RetryPolicy::none());

        let result = enumerator.next_release().await;
        assert!(matches!(
            result,
            Err(SyncError::Source { ref project, .. }) if project == "qsctl"
        ));
    }
}
