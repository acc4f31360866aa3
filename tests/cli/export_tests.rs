//! Export command tests

use std::path::PathBuf;

use edd_export::cli::commands::export::{ExportSettings, run_export};
use edd_export::cli::error::CliError;
use edd_export::{ClientOptions, Endpoint};
use serde_json::json;
use tempfile::tempdir;
use wiremock::MockServer;

use crate::common::{USERNAME, mount_export, mount_login, mount_lookup, password};

fn settings(server: &MockServer, output: PathBuf, include_index: bool) -> ExportSettings {
    ExportSettings {
        slug: "growth".to_string(),
        username: USERNAME.to_string(),
        endpoint: Endpoint::parse(&server.uri()).unwrap(),
        output,
        batch_size: 2,
        include_index,
        progress: false,
        client_options: ClientOptions::default(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_export_writes_csv_with_index() {
    let server = MockServer::start().await;
    mount_login(&server, true).await;
    mount_lookup(&server, "growth", json!([{"pk": 12, "slug": "growth"}])).await;
    mount_export(&server, 12, Some("3"), "Line,Value\nA,1\nB,2\n\nC,3\n", 1).await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("growth.csv");
    let settings = settings(&server, output.clone(), true);

    let written = tokio::task::spawn_blocking(move || run_export(&settings, password()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(written, output);
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        ",Line,Value\n0,A,1\n1,B,2\n2,C,3\n"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_export_creates_output_directory() {
    let server = MockServer::start().await;
    mount_login(&server, true).await;
    mount_lookup(&server, "growth", json!([{"pk": 12}])).await;
    mount_export(&server, 12, None, "Line,Value\nA,1\n", 1).await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("exports").join("growth.csv");
    let settings = settings(&server, output.clone(), false);

    tokio::task::spawn_blocking(move || run_export(&settings, password()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "Line,Value\nA,1\n"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_login_failure_skips_export() {
    let server = MockServer::start().await;
    mount_login(&server, false).await;
    mount_lookup(&server, "growth", json!([{"pk": 12}])).await;
    // Neither the count nor the stream endpoint may be called
    mount_export(&server, 12, Some("3"), "Line,Value\nA,1\n", 0).await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("growth.csv");
    let settings = settings(&server, output.clone(), true);

    let result = tokio::task::spawn_blocking(move || run_export(&settings, password()))
        .await
        .unwrap();

    assert!(matches!(result, Err(CliError::LoginFailed(user)) if user == USERNAME));
    assert!(!output.exists(), "No file should be written");
    let lookups = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().starts_with("/rest/"))
        .count();
    assert_eq!(lookups, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_export_not_found_writes_nothing() {
    let server = MockServer::start().await;
    mount_login(&server, true).await;
    mount_lookup(&server, "growth", json!([])).await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("growth.csv");
    let settings = settings(&server, output.clone(), true);

    let result = tokio::task::spawn_blocking(move || run_export(&settings, password()))
        .await
        .unwrap();

    assert!(matches!(
        result,
        Err(CliError::Export(edd_export::ExportError::NotFound { .. }))
    ));
    assert!(!output.exists());
}
