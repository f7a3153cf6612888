//! Validation of raw inputs into a [`MirrorConfig`].

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_ENDPOINT, DEFAULT_GITHUB_API_URL, DEFAULT_INDEX_PATH,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_OWNER, DEFAULT_PROJECTS, DEFAULT_PUBLIC_DOMAIN,
    DEFAULT_TIMEOUT_SECS,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    ConfigInputs, FailurePolicy, GitHubSettings, MirrorConfig, ReleaseMode, Secret,
    StorageSettings,
};

impl MirrorConfig {
    /// Apply defaults to `inputs` and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when a required setting is absent and
    /// [`ConfigError::InvalidField`] when a value is out of range or malformed.
    pub fn from_inputs(inputs: ConfigInputs) -> ConfigResult<Self> {
        let api_url = non_empty(inputs.github_api_url)
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());
        let github = GitHubSettings {
            api_url: parse_http_url("github_api_url", &api_url)?,
            owner: parse_owner(non_empty(inputs.owner))?,
            token: non_empty(inputs.github_token).map(Secret::new),
        };

        let storage = StorageSettings {
            access_key: required("access_key", inputs.access_key)?,
            secret_key: Secret::new(required("secret_key", inputs.secret_key)?),
            bucket: required("bucket", inputs.bucket)?,
            zone: non_empty(inputs.zone),
            endpoint: parse_http_url(
                "endpoint",
                &non_empty(inputs.endpoint).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            )?,
            public_domain: parse_public_domain(non_empty(inputs.public_domain))?,
        };

        let mode = match non_empty(inputs.mode) {
            Some(mode) => mode.parse::<ReleaseMode>()?,
            None => ReleaseMode::default(),
        };

        let index_path = inputs
            .index_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_PATH));
        if index_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("index_path", "", "empty_path"));
        }

        Ok(Self {
            github,
            storage,
            projects: parse_projects(inputs.projects)?,
            mode,
            index_path,
            concurrency: positive(
                "concurrency",
                inputs.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            )?,
            http_timeout: Duration::from_secs(positive(
                "timeout_secs",
                inputs.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            )?),
            max_attempts: positive(
                "max_attempts",
                inputs.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            )?,
            failure_policy: if inputs.fail_fast {
                FailurePolicy::Abort
            } else {
                FailurePolicy::IsolateProjects
            },
            trust_index: inputs.trust_index,
            metrics_file: inputs.metrics_file,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(field: &'static str, value: Option<String>) -> ConfigResult<String> {
    non_empty(value).ok_or(ConfigError::Missing { field })
}

fn positive<T>(field: &'static str, value: T) -> ConfigResult<T>
where
    T: Copy + Default + PartialOrd + ToString,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::invalid(field, value.to_string(), "must_be_positive"))
    }
}

fn parse_http_url(field: &'static str, value: &str) -> ConfigResult<Url> {
    let url = Url::parse(value).map_err(|_| ConfigError::invalid(field, value, "invalid_url"))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::invalid(field, value, "unsupported_scheme"));
    }
    Ok(url)
}

fn parse_owner(owner: Option<String>) -> ConfigResult<String> {
    let owner = owner.unwrap_or_else(|| DEFAULT_OWNER.to_string());
    if owner.contains('/') {
        return Err(ConfigError::invalid("owner", owner, "invalid_owner"));
    }
    Ok(owner)
}

fn parse_public_domain(domain: Option<String>) -> ConfigResult<String> {
    let domain = domain
        .as_deref()
        .unwrap_or(DEFAULT_PUBLIC_DOMAIN)
        .to_ascii_lowercase();
    let malformed = domain.starts_with('.')
        || domain.ends_with('.')
        || domain.contains("..")
        || !domain
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-'));
    if malformed {
        return Err(ConfigError::invalid("public_domain", domain, "invalid_domain"));
    }
    Ok(domain)
}

fn parse_projects(projects: Vec<String>) -> ConfigResult<Vec<String>> {
    if projects.is_empty() {
        return Ok(DEFAULT_PROJECTS.iter().map(ToString::to_string).collect());
    }
    let mut seen = BTreeSet::new();
    let mut parsed = Vec::with_capacity(projects.len());
    for project in projects {
        let name = project.trim();
        if name.is_empty() {
            return Err(ConfigError::invalid("projects", project, "empty_project"));
        }
        if name.contains('/') {
            return Err(ConfigError::invalid("projects", name, "invalid_project_name"));
        }
        if !seen.insert(name.to_string()) {
            return Err(ConfigError::invalid("projects", name, "duplicate_project"));
        }
        parsed.push(name.to_string());
    }
    Ok(parsed)
}
