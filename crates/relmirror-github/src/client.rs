//! reqwest-backed [`ReleaseSource`] for the GitHub REST API.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::error::{GitHubError, GitHubResult};
use crate::model::{Asset, Release, ReleasePage};
use crate::source::ReleaseSource;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// Releases requested per listing page.
pub const DEFAULT_RELEASES_PER_PAGE: u32 = 30;

const USER_AGENT: &str = concat!("relmirror/", env!("CARGO_PKG_VERSION"));
const MEDIA_TYPE: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";

/// Settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct GitHubOptions {
    /// API root, normally [`DEFAULT_API_URL`].
    pub api_url: Url,
    /// Account owning the mirrored repositories.
    pub owner: String,
    /// Bearer token; anonymous requests when `None`.
    pub token: Option<String>,
    /// Timeout applied to every request.
    pub timeout: Duration,
    /// Page size for release listings.
    pub releases_per_page: u32,
}

/// GitHub REST client scoped to one repository owner.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    api: Client,
    downloads: Client,
    api_url: Url,
    owner: String,
    releases_per_page: u32,
}

impl GitHubClient {
    /// Build the API and download clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or a client
    /// cannot be constructed.
    pub fn new(options: GitHubOptions) -> GitHubResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(MEDIA_TYPE));
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        if let Some(token) = options.token.as_deref().filter(|token| !token.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| GitHubError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let api = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| GitHubError::ClientBuild { source })?;
        // Asset downloads go to the public CDN and never carry the API token.
        let downloads = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()
            .map_err(|source| GitHubError::ClientBuild { source })?;

        Ok(Self {
            api,
            downloads,
            api_url: options.api_url,
            owner: options.owner,
            releases_per_page: options.releases_per_page.max(1),
        })
    }

    fn repo_url(&self, project: &str, tail: &[&str]) -> GitHubResult<Url> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| GitHubError::UrlNotBase {
                url: self.api_url.to_string(),
            })?;
            segments
                .pop_if_empty()
                .extend(["repos", self.owner.as_str(), project])
                .extend(tail);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> GitHubResult<(T, HeaderMap)> {
        debug!(operation, url = %url, "github request");
        let response = self
            .api
            .get(url.clone())
            .send()
            .await
            .map_err(|source| GitHubError::request(operation, &url, source))?;
        let response = ensure_success(operation, &url, response)?;
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|source| GitHubError::request(operation, &url, source))?;
        let value = serde_json::from_slice(&body).map_err(|source| GitHubError::Decode {
            operation,
            url: url.to_string(),
            source,
        })?;
        Ok((value, headers))
    }
}

#[async_trait]
impl ReleaseSource for GitHubClient {
    async fn list_releases(&self, project: &str, page: u32) -> GitHubResult<ReleasePage> {
        let mut url = self.repo_url(project, &["releases"])?;
        url.query_pairs_mut()
            .append_pair("per_page", &self.releases_per_page.to_string())
            .append_pair("page", &page.to_string());
        let (releases, headers) = self.get_json::<Vec<Release>>("list_releases", url).await?;
        Ok(ReleasePage {
            releases,
            next_page: next_page(&headers),
        })
    }

    async fn latest_release(&self, project: &str) -> GitHubResult<Release> {
        let url = self.repo_url(project, &["releases", "latest"])?;
        let (release, _) = self.get_json::<Release>("latest_release", url).await?;
        Ok(release)
    }

    async fn list_release_assets(
        &self,
        project: &str,
        release_id: u64,
        per_page: u32,
    ) -> GitHubResult<Vec<Asset>> {
        let id = release_id.to_string();
        let mut url = self.repo_url(project, &["releases", id.as_str(), "assets"])?;
        url.query_pairs_mut()
            .append_pair("per_page", &per_page.to_string());
        let (assets, _) = self
            .get_json::<Vec<Asset>>("list_release_assets", url)
            .await?;
        Ok(assets)
    }

    async fn download_asset(&self, asset: &Asset, destination: &mut File) -> GitHubResult<u64> {
        const OPERATION: &str = "download_asset";
        let url =
            Url::parse(&asset.browser_download_url).map_err(|source| GitHubError::InvalidUrl {
                url: asset.browser_download_url.clone(),
                source,
            })?;
        let response = self
            .downloads
            .get(url.clone())
            .send()
            .await
            .map_err(|source| GitHubError::request(OPERATION, &url, source))?;
        let response = ensure_success(OPERATION, &url, response)?;

        let mut written = 0_u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|source| GitHubError::request(OPERATION, &url, source))?;
            destination
                .write_all(&chunk)
                .await
                .map_err(|source| GitHubError::Io {
                    operation: "download_asset.write",
                    source,
                })?;
            written += chunk.len() as u64;
        }
        destination
            .flush()
            .await
            .map_err(|source| GitHubError::Io {
                operation: "download_asset.flush",
                source,
            })?;
        Ok(written)
    }
}

fn ensure_success(
    operation: &'static str,
    url: &Url,
    response: Response,
) -> GitHubResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(GitHubError::Status {
            operation,
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Extract the `page` query parameter of the `rel="next"` entry in a `Link` header.
#[must_use]
pub fn next_page(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.split(';').any(|param| param.trim() == "rel=\"next\"") {
            return None;
        }
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        let url = Url::parse(target).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse::<u32>().ok())
            .filter(|page| *page > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_link(link: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(link) {
            headers.insert(LINK, value);
        }
        headers
    }

    #[test]
    fn next_page_reads_rel_next() {
        let headers = headers_with_link(
            "<https://api.github.com/repositories/1/releases?per_page=30&page=3>; rel=\"next\", \
             <https://api.github.com/repositories/1/releases?per_page=30&page=9>; rel=\"last\"",
        );
        assert_eq!(next_page(&headers), Some(3));
    }

    #[test]
    fn next_page_absent_on_last_page() {
        let headers = headers_with_link(
            "<https://api.github.com/repositories/1/releases?page=1>; rel=\"first\", \
             <https://api.github.com/repositories/1/releases?page=2>; rel=\"prev\"",
        );
        assert_eq!(next_page(&headers), None);
        assert_eq!(next_page(&HeaderMap::new()), None);
    }

    #[test]
    fn next_page_ignores_zero() {
        let headers =
            headers_with_link("<https://api.github.com/repositories/1/releases?page=0>; rel=\"next\"");
        assert_eq!(next_page(&headers), None);
    }

    #[test]
    fn repo_url_builds_segments() -> Result<(), Box<dyn std::error::Error>> {
        let client = GitHubClient::new(GitHubOptions {
            api_url: Url::parse(DEFAULT_API_URL)?,
            owner: "qingstor".to_string(),
            token: None,
            timeout: Duration::from_secs(5),
            releases_per_page: DEFAULT_RELEASES_PER_PAGE,
        })?;
        let url = client.repo_url("qsctl", &["releases", "latest"])?;
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/qingstor/qsctl/releases/latest"
        );
        Ok(())
    }
}
