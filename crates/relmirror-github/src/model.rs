//! Release and asset payloads returned by the hosting platform.

use serde::{Deserialize, Serialize};

/// A published release of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Platform identifier used to list the release assets.
    pub id: u64,
    /// Tag the release was cut from; used as the mirrored version.
    pub tag_name: String,
    /// Human readable title.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the release is still a draft.
    #[serde(default)]
    pub draft: bool,
    /// Whether the release is marked as a pre-release.
    #[serde(default)]
    pub prerelease: bool,
}

impl Release {
    /// Convenience constructor used by fakes and tests.
    #[must_use]
    pub fn new(id: u64, tag_name: impl Into<String>) -> Self {
        Self {
            id,
            tag_name: tag_name.into(),
            name: None,
            draft: false,
            prerelease: false,
        }
    }
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Platform identifier.
    #[serde(default)]
    pub id: u64,
    /// Filename of the asset.
    pub name: String,
    /// Public URL serving the asset bytes.
    pub browser_download_url: String,
    /// Advertised size in bytes.
    #[serde(default)]
    pub size: u64,
}

impl Asset {
    /// Convenience constructor used by fakes and tests.
    #[must_use]
    pub fn new(name: impl Into<String>, browser_download_url: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            browser_download_url: browser_download_url.into(),
            size: 0,
        }
    }
}

/// One page of a paginated release listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleasePage {
    /// Releases on this page, in platform order.
    pub releases: Vec<Release>,
    /// Next page to request, `None` when this was the last page.
    pub next_page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn release_payload_ignores_unknown_fields() -> Result<(), serde_json::Error> {
        let release: Release = serde_json::from_value(json!({
            "id": 42,
            "tag_name": "v1.2.0",
            "name": "qsctl v1.2.0",
            "html_url": "https://github.com/qingstor/qsctl/releases/v1.2.0",
            "assets": []
        }))?;
        assert_eq!(release.id, 42);
        assert_eq!(release.tag_name, "v1.2.0");
        assert!(!release.draft);
        Ok(())
    }

    #[test]
    fn asset_payload_defaults_optional_fields() -> Result<(), serde_json::Error> {
        let asset: Asset = serde_json::from_value(json!({
            "name": "qsctl_linux_amd64.tar.gz",
            "browser_download_url": "https://github.com/qingstor/qsctl/releases/download/v1.2.0/qsctl_linux_amd64.tar.gz"
        }))?;
        assert_eq!(asset.size, 0);
        assert_eq!(asset.name, "qsctl_linux_amd64.tar.gz");
        Ok(())
    }
}
