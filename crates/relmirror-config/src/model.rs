//! Typed configuration consumed by the mirroring pipeline.
//!
//! # Design
//! - `ConfigInputs` mirrors the raw CLI/environment surface; everything optional.
//! - `MirrorConfig` is only ever produced by validation, so consumers never
//!   re-check invariants.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Which releases of a project are mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseMode {
    /// Every published release, following pagination.
    #[default]
    All,
    /// Only the release the platform marks as latest.
    Latest,
}

impl ReleaseMode {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Latest => "latest",
        }
    }
}

impl fmt::Display for ReleaseMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ReleaseMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "latest" => Ok(Self::Latest),
            _ => Err(ConfigError::invalid("mode", value, "unknown_release_mode")),
        }
    }
}

/// How a failing project affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failure.
    Abort,
    /// Log and count the failure, then continue with the next project.
    #[default]
    IsolateProjects,
}

/// Credential wrapper whose `Debug` output never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("Secret(<redacted>)")
    }
}

/// Hosting platform settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSettings {
    /// REST API root.
    pub api_url: Url,
    /// Repository owner.
    pub owner: String,
    /// Optional API token; anonymous access when absent.
    pub token: Option<Secret>,
}

/// Object storage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    /// Access key identifier.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: Secret,
    /// Destination bucket.
    pub bucket: String,
    /// Bucket zone; detected at runtime when absent.
    pub zone: Option<String>,
    /// Service endpoint.
    pub endpoint: Url,
    /// Domain of the public URLs, `<bucket>.<zone>.<public_domain>`.
    pub public_domain: String,
}

/// Validated configuration for one mirroring run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    /// Hosting platform settings.
    pub github: GitHubSettings,
    /// Object storage settings.
    pub storage: StorageSettings,
    /// Projects mirrored, in order.
    pub projects: Vec<String>,
    /// Release selection mode.
    pub mode: ReleaseMode,
    /// Location of the persisted index.
    pub index_path: PathBuf,
    /// Asset transfers in flight per release.
    pub concurrency: usize,
    /// Timeout applied to every HTTP request.
    pub http_timeout: Duration,
    /// Attempts per operation, including the first.
    pub max_attempts: u32,
    /// Failure handling across projects.
    pub failure_policy: FailurePolicy,
    /// Skip the storage check for assets already in the index.
    pub trust_index: bool,
    /// Optional Prometheus textfile written at the end of the run.
    pub metrics_file: Option<PathBuf>,
}

/// Raw configuration as collected from flags and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigInputs {
    /// GitHub API token.
    pub github_token: Option<String>,
    /// Repository owner.
    pub owner: Option<String>,
    /// GitHub REST API root.
    pub github_api_url: Option<String>,
    /// Storage access key.
    pub access_key: Option<String>,
    /// Storage secret key.
    pub secret_key: Option<String>,
    /// Storage bucket.
    pub bucket: Option<String>,
    /// Storage zone.
    pub zone: Option<String>,
    /// Storage endpoint.
    pub endpoint: Option<String>,
    /// Domain of the public URLs.
    pub public_domain: Option<String>,
    /// Projects to mirror.
    pub projects: Vec<String>,
    /// Release mode name.
    pub mode: Option<String>,
    /// Index document path.
    pub index_path: Option<PathBuf>,
    /// Per-release concurrency.
    pub concurrency: Option<usize>,
    /// HTTP timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Attempts per operation.
    pub max_attempts: Option<u32>,
    /// Abort on the first failure.
    pub fail_fast: bool,
    /// Trust the index over storage checks.
    pub trust_index: bool,
    /// Prometheus textfile path.
    pub metrics_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_mode_parses_case_insensitively() -> Result<(), ConfigError> {
        assert_eq!("all".parse::<ReleaseMode>()?, ReleaseMode::All);
        assert_eq!(" Latest ".parse::<ReleaseMode>()?, ReleaseMode::Latest);
        assert!(matches!(
            "newest".parse::<ReleaseMode>(),
            Err(ConfigError::InvalidField { field: "mode", .. })
        ));
        assert_eq!(ReleaseMode::Latest.to_string(), "latest");
        Ok(())
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(<redacted>)");
        assert_eq!(secret.expose(), "hunter2");
    }
}
