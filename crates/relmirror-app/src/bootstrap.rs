//! Builds the collaborators from validated configuration and drives one run.

use std::sync::Arc;

use clap::Parser;
use relmirror_config::MirrorConfig;
use relmirror_github::{DEFAULT_RELEASES_PER_PAGE, GitHubClient, GitHubOptions};
use relmirror_index::Index;
use relmirror_storage::{QingStorClient, QingStorEndpoint, QingStorOptions};
use relmirror_sync::{SyncError, SyncOrchestrator, SyncReport, SyncSettings};
use relmirror_telemetry::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, RunContext, SyncMetrics, init_logging,
};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::cli::Cli;
use crate::error::{AppError, AppResult, EXIT_OK};

/// Binary entrypoint: parse flags, install logging, run once.
///
/// Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: DEFAULT_LOG_LEVEL,
        format: LogFormat::from_name(cli.log_format()),
    };
    if let Err(err) = init_logging(&logging) {
        let error = AppError::telemetry("telemetry.init_logging", err);
        let code = error.exit_code();
        eprintln!("error: {}", error.display_message());
        return code;
    }
    let context = RunContext::new(Uuid::new_v4());

    match run_with(cli).instrument(context.span()).await {
        Ok(_) => EXIT_OK,
        Err(err) => {
            let code = err.exit_code();
            let message = err.display_message();
            error!(
                parent: &context.span(),
                exit_code = code,
                error = %message,
                "mirror run failed"
            );
            eprintln!("error: {message} (run {})", context.run_id());
            code
        }
    }
}

/// Validate `cli`, wire the production collaborators and run every project.
///
/// # Errors
///
/// Returns [`AppError::PartialFailure`] when the run completed with isolated
/// project failures, and the originating error for everything else.
pub async fn run_with(cli: Cli) -> AppResult<SyncReport> {
    let config =
        MirrorConfig::from_inputs(cli.into_inputs()).map_err(|source| AppError::Config { source })?;
    let endpoint = QingStorEndpoint::from_url(&config.storage.endpoint);
    let settings = SyncSettings::from_config(&config);

    let source = GitHubClient::new(github_options(&config))
        .map_err(|err| AppError::github("github.client", err))?;
    let store = QingStorClient::new(storage_options(&config, endpoint))
        .map_err(|err| AppError::storage("qingstor.client", err))?;
    let index = Index::load(&config.index_path).map_err(|source| AppError::Sync {
        source: SyncError::Index { source },
    })?;
    let metrics =
        SyncMetrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

    info!(
        projects = ?config.projects,
        mode = %config.mode,
        bucket = %config.storage.bucket,
        index = %config.index_path.display(),
        known_assets = index.len(),
        "starting mirror run"
    );

    let orchestrator = SyncOrchestrator::new(
        Arc::new(source),
        Arc::new(store),
        index,
        &config.index_path,
        settings,
        metrics.clone(),
    );
    let outcome = orchestrator.run().await;

    let exported = config
        .metrics_file
        .as_deref()
        .map_or(Ok(()), |path| metrics.write_textfile(path));
    let report = match outcome {
        Ok(report) => report,
        Err(source) => {
            if let Err(err) = &exported {
                warn!(error = %err, "metrics textfile not written");
            }
            return Err(AppError::Sync { source });
        }
    };
    exported.map_err(|err| AppError::telemetry("telemetry.write_textfile", err))?;

    for stats in &report.projects {
        info!(
            project = %stats.project,
            releases = stats.releases,
            present = stats.present,
            mirrored = stats.mirrored,
            failed = stats.failed,
            bytes = stats.bytes,
            "project synced"
        );
    }
    for failure in &report.failures {
        error!(
            project = %failure.project,
            kind = %failure.kind,
            error = %failure.message,
            "project failed"
        );
    }
    info!(
        mirrored = report.mirrored(),
        present = report.present(),
        failed_projects = report.failures.len(),
        "mirror run finished"
    );

    if report.is_success() {
        Ok(report)
    } else {
        Err(AppError::PartialFailure {
            projects: report
                .failures
                .iter()
                .map(|failure| failure.project.clone())
                .collect(),
        })
    }
}

fn github_options(config: &MirrorConfig) -> GitHubOptions {
    GitHubOptions {
        api_url: config.github.api_url.clone(),
        owner: config.github.owner.clone(),
        token: config
            .github
            .token
            .as_ref()
            .map(|token| token.expose().to_string()),
        timeout: config.http_timeout,
        releases_per_page: DEFAULT_RELEASES_PER_PAGE,
    }
}

fn storage_options(config: &MirrorConfig, endpoint: QingStorEndpoint) -> QingStorOptions {
    QingStorOptions {
        access_key: config.storage.access_key.clone(),
        secret_key: config.storage.secret_key.expose().to_string(),
        bucket: config.storage.bucket.clone(),
        zone: config.storage.zone.clone(),
        endpoint,
        timeout: config.http_timeout,
    }
}
