//! CLI integration tests

use std::process::Command;

fn dsc() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dsc"));
    cmd.env_remove("DSC_COLLECTOR_URL");
    cmd
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = dsc()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Docker Stats"), "Should show app name");
    assert!(stdout.contains("list"), "Should show list command");
    assert!(stdout.contains("prune"), "Should show prune command");
    assert!(stdout.contains("--collector-url"), "Should show collector option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = dsc()
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("dsc"), "Should show binary name");
}

/// Prune needs an instance argument
#[test]
fn test_prune_requires_instance() {
    let output = dsc()
        .arg("prune")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Prune without instance should fail");
}

/// List decodes the collector's JSON
#[test]
fn test_list_json_output() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/api/docker-stats")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"instance_id":"h1","images_size_gb":12.5,"timestamp":"2024-01-01T00:00:00Z","prune_action":false}]"#,
        )
        .create();

    let output = dsc()
        .args(["--collector-url", &server.url(), "--format", "json", "list"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "List should succeed");

    let list: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(list[0]["instance_id"], "h1");
    assert_eq!(list[0]["images_size_gb"], 12.5);
}

/// Prune sends the instance as a query parameter
#[test]
fn test_prune_calls_collector() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/prune")
        .match_query(mockito::Matcher::UrlEncoded(
            "instance".to_string(),
            "h2".to_string(),
        ))
        .with_status(200)
        .with_body("Prune done, metrics deleted\n")
        .create();

    let output = dsc()
        .args(["--collector-url", &server.url(), "prune", "h2"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Prune should succeed");
    mock.assert();
}

/// A gateway error from the collector fails the command
#[test]
fn test_prune_reports_gateway_error() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/api/prune")
        .match_query(mockito::Matcher::Any)
        .with_status(502)
        .with_body("Failed to call agent\n")
        .create();

    let output = dsc()
        .args(["--collector-url", &server.url(), "prune", "h3"])
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "Prune should fail");
    assert!(stderr.contains("502"), "Should show gateway status");
}
