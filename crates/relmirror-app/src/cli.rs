//! Flags with environment fallbacks. Defaults live in `relmirror-config` so the
//! binary and the library agree on them.

use std::path::PathBuf;

use clap::Parser;
use relmirror_config::ConfigInputs;

/// Mirror GitHub release assets into a QingStor bucket.
#[derive(Debug, Parser)]
#[command(name = "relmirror", version, about = "Mirror GitHub release assets into QingStor")]
pub struct Cli {
    /// GitHub API token; requests are anonymous without one.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
    /// Repository owner on GitHub.
    #[arg(long, env = "RELMIRROR_OWNER")]
    owner: Option<String>,
    #[arg(long, env = "GITHUB_API_URL")]
    github_api_url: Option<String>,
    /// QingStor access key id.
    #[arg(long, env = "QINGSTOR_ACCESS_KEY", hide_env_values = true)]
    access_key: Option<String>,
    /// QingStor secret access key.
    #[arg(long, env = "QINGSTOR_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,
    #[arg(long, env = "QINGSTOR_BUCKET_NAME")]
    bucket: Option<String>,
    /// Bucket zone; detected from the service when omitted.
    #[arg(long, env = "QINGSTOR_BUCKET_LOCATION")]
    zone: Option<String>,
    #[arg(long, env = "QINGSTOR_ENDPOINT")]
    endpoint: Option<String>,
    /// Domain of the public URLs written to the index.
    #[arg(long, env = "QINGSTOR_PUBLIC_DOMAIN")]
    public_domain: Option<String>,
    /// Project to mirror; repeat the flag or pass a comma separated list.
    #[arg(
        long = "project",
        env = "RELMIRROR_PROJECTS",
        value_delimiter = ','
    )]
    projects: Vec<String>,
    /// Mirror every release or only the latest one.
    #[arg(long, env = "RELMIRROR_MODE", value_parser = ["all", "latest"])]
    mode: Option<String>,
    /// Path of the index document.
    #[arg(long = "index", env = "RELMIRROR_INDEX")]
    index_path: Option<PathBuf>,
    /// Assets transferred at once within a release.
    #[arg(long, env = "RELMIRROR_CONCURRENCY")]
    concurrency: Option<usize>,
    #[arg(long, env = "RELMIRROR_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
    /// Attempts per network operation, including the first.
    #[arg(long, env = "RELMIRROR_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,
    /// Stop at the first project failure.
    #[arg(long, env = "RELMIRROR_FAIL_FAST")]
    fail_fast: bool,
    /// Skip storage checks for assets already in the index.
    #[arg(long, env = "RELMIRROR_TRUST_INDEX")]
    trust_index: bool,
    /// Write Prometheus metrics to this textfile after the run.
    #[arg(long, env = "RELMIRROR_METRICS_FILE")]
    metrics_file: Option<PathBuf>,
    #[arg(long, env = "RELMIRROR_LOG_FORMAT", value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

impl Cli {
    /// Configured log format name, if any.
    #[must_use]
    pub fn log_format(&self) -> Option<&str> {
        self.log_format.as_deref()
    }

    /// Raw configuration inputs for validation.
    #[must_use]
    pub fn into_inputs(self) -> ConfigInputs {
        ConfigInputs {
            github_token: self.github_token,
            owner: self.owner,
            github_api_url: self.github_api_url,
            access_key: self.access_key,
            secret_key: self.secret_key,
            bucket: self.bucket,
            zone: self.zone,
            endpoint: self.endpoint,
            public_domain: self.public_domain,
            projects: self.projects,
            mode: self.mode,
            index_path: self.index_path,
            concurrency: self.concurrency,
            timeout_secs: self.timeout_secs,
            max_attempts: self.max_attempts,
            fail_fast: self.fail_fast,
            trust_index: self.trust_index,
            metrics_file: self.metrics_file,
        }
    }
}
