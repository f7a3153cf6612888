use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};
use clap::Parser;
use httpmock::Method::HEAD;
use httpmock::prelude::*;
use relmirror_app::error::{EXIT_CONFIG, EXIT_CORRUPT_STATE, EXIT_PARTIAL};
use relmirror_app::{AppError, Cli, run_with};
use serde_json::{Value, json};
use tempfile::TempDir;

fn cli(github: &MockServer, storage: &MockServer, index: &Path, extra: &[&str]) -> Result<Cli> {
    cli_with_key(github, storage, index, "AKID", extra)
}

fn cli_with_key(
    github: &MockServer,
    storage: &MockServer,
    index: &Path,
    access_key: &str,
    extra: &[&str],
) -> Result<Cli> {
    let mut args = vec![
        "relmirror".to_string(),
        "--github-token".to_string(),
        String::new(),
        "--github-api-url".to_string(),
        github.base_url(),
        "--owner".to_string(),
        "qingstor".to_string(),
        "--access-key".to_string(),
        access_key.to_string(),
        "--secret-key".to_string(),
        "SECRET".to_string(),
        "--bucket".to_string(),
        "releases".to_string(),
        "--zone".to_string(),
        "pek3b".to_string(),
        "--endpoint".to_string(),
        storage.base_url(),
        "--index".to_string(),
        index.display().to_string(),
        "--max-attempts".to_string(),
        "1".to_string(),
        "--timeout-secs".to_string(),
        "5".to_string(),
    ];
    args.extend(extra.iter().map(|arg| (*arg).to_string()));
    Ok(Cli::try_parse_from(args)?)
}

fn mock_demo_release(github: &MockServer) {
    github.mock(|when, then| {
        when.method(GET)
            .path("/repos/qingstor/demo/releases")
            .query_param("page", "1");
        then.status(200)
            .json_body(json!([{"id": 1, "tag_name": "v1.0.0"}]));
    });
    github.mock(|when, then| {
        when.method(GET).path("/repos/qingstor/demo/releases/1/assets");
        then.status(200).json_body(json!([{
            "id": 10,
            "name": "demo.tar.gz",
            "browser_download_url": github.url("/download/v1.0.0/demo.tar.gz"),
            "size": 5
        }]));
    });
    github.mock(|when, then| {
        when.method(GET).path("/download/v1.0.0/demo.tar.gz");
        then.status(200).body("hello");
    });
}

#[tokio::test]
async fn run_mirrors_missing_assets_and_exports_metrics() -> Result<()> {
    let github = MockServer::start_async().await;
    let storage = MockServer::start_async().await;
    mock_demo_release(&github);
    let stat = storage.mock(|when, then| {
        when.method(HEAD).path("/releases/demo/v1.0.0/demo.tar.gz");
        then.status(404);
    });
    let put = storage.mock(|when, then| {
        when.method(PUT)
            .path("/releases/demo/v1.0.0/demo.tar.gz")
            .header("content-length", "5")
            .body("hello");
        then.status(201);
    });

    let dir = TempDir::new()?;
    let index = dir.path().join("site").join("data.json");
    let metrics = dir.path().join("relmirror.prom");
    let metrics_arg = metrics.display().to_string();
    let report = run_with(cli(
        &github,
        &storage,
        &index,
        &["--project", "demo", "--metrics-file", &metrics_arg],
    )?)
    .await
    .map_err(|err| anyhow!(err.display_message()))?;

    assert_eq!(report.mirrored(), 1);
    stat.assert();
    put.assert();

    let document: Value = serde_json::from_str(&fs::read_to_string(&index)?)?;
    assert_eq!(
        document,
        json!({"demo": {"v1.0.0": {
            "demo.tar.gz": "https://releases.pek3b.qingstor.com/demo/v1.0.0/demo.tar.gz"
        }}})
    );

    let exported = fs::read_to_string(&metrics)?;
    assert!(exported.contains("relmirror_assets_total{outcome=\"mirrored\"} 1"));
    assert!(exported.contains("relmirror_bytes_uploaded_total 5"));
    Ok(())
}

#[tokio::test]
async fn blank_credentials_exit_with_configuration_code() -> Result<()> {
    let github = MockServer::start_async().await;
    let storage = MockServer::start_async().await;
    let dir = TempDir::new()?;
    let index = dir.path().join("data.json");

    let error = run_with(cli_with_key(&github, &storage, &index, " ", &[])?)
        .await
        .err()
        .ok_or_else(|| anyhow!("blank access key must be rejected"))?;
    assert!(matches!(error, AppError::Config { .. }));
    assert_eq!(error.exit_code(), EXIT_CONFIG);
    assert!(!index.exists());
    Ok(())
}

#[tokio::test]
async fn corrupt_index_stops_before_any_request() -> Result<()> {
    let github = MockServer::start_async().await;
    let storage = MockServer::start_async().await;
    let listing = github.mock(|when, then| {
        when.any_request();
        then.status(500);
    });
    let dir = TempDir::new()?;
    let index = dir.path().join("data.json");
    fs::write(&index, "{\"demo\": ")?;

    let error = run_with(cli(&github, &storage, &index, &[])?)
        .await
        .err()
        .ok_or_else(|| anyhow!("corrupt index must fail the run"))?;
    assert_eq!(error.exit_code(), EXIT_CORRUPT_STATE);
    assert!(error.display_message().contains("index document is corrupt"));
    listing.assert_hits(0);
    assert_eq!(fs::read_to_string(&index)?, "{\"demo\": ");
    Ok(())
}

#[tokio::test]
async fn failed_project_is_reported_after_the_rest_sync() -> Result<()> {
    let github = MockServer::start_async().await;
    let storage = MockServer::start_async().await;
    mock_demo_release(&github);
    github.mock(|when, then| {
        when.method(GET).path("/repos/qingstor/gone/releases");
        then.status(404);
    });
    storage.mock(|when, then| {
        when.method(HEAD).path("/releases/demo/v1.0.0/demo.tar.gz");
        then.status(200).header("content-length", "5");
    });
    let dir = TempDir::new()?;
    let index = dir.path().join("data.json");

    let error = run_with(cli(&github, &storage, &index, &["--project", "gone,demo"])?)
        .await
        .err()
        .ok_or_else(|| anyhow!("missing project must be reported"))?;
    assert_eq!(error.exit_code(), EXIT_PARTIAL);
    assert_eq!(
        error.display_message(),
        "sync finished with failed projects: gone"
    );

    let document: Value = serde_json::from_str(&fs::read_to_string(&index)?)?;
    assert!(document["demo"]["v1.0.0"]["demo.tar.gz"].is_string());
    assert!(document.get("gone").is_none());
    Ok(())
}
