//! Integration tests for the `reqflow` CLI binary.
//!
//! Argument parsing, completions, and error handling run without a server.
//! Request tests point the binary at a wiremock server and a temporary
//! config directory.
#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::time::Duration;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `reqflow` binary with env isolation.
///
/// Clears all `REQFLOW_*` env vars and points config directories at
/// `config_home` so tests never touch the user's real configuration.
fn reqflow_cmd_in(config_home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("reqflow");
    cmd.env("HOME", config_home)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG")
        .env_remove("REQFLOW_PROFILE")
        .env_remove("REQFLOW_BASE_URL")
        .env_remove("REQFLOW_TOKEN")
        .env_remove("REQFLOW_OUTPUT")
        .env_remove("REQFLOW_INSECURE")
        .env_remove("REQFLOW_TIMEOUT");
    cmd
}

fn reqflow_cmd() -> assert_cmd::Command {
    reqflow_cmd_in(Path::new("/tmp/reqflow-cli-test-nonexistent"))
}

/// Write `body` where the binary looks for its config under `config_home`.
fn write_config(config_home: &Path, body: &str) {
    let dir = config_home.join("reqflow");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), body).unwrap();
}

fn sample_config(base_url: &str) -> String {
    format!(
        r#"
default_profile = "local"

[profiles.local]
base_url = "{base_url}"
token = "profile-secret"

[profiles.local.headers]
"x-client" = "reqflow"

[commands.get-user]
endpoint = "/users/:id"

[commands.create-user]
endpoint = "/users"
method = "POST"
retry = 1
retry_time = 10
"#
    )
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = reqflow_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    reqflow_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("fetch")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("commands"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    reqflow_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reqflow"));
}

#[test]
fn test_fetch_help_lists_request_flags() {
    reqflow_cmd().args(["fetch", "--help"]).assert().success().stdout(
        predicate::str::contains("--param")
            .and(predicate::str::contains("--query"))
            .and(predicate::str::contains("--retry"))
            .and(predicate::str::contains("--streaming")),
    );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    reqflow_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    reqflow_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases without a server ────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = reqflow_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_invalid_output_format() {
    let output = reqflow_cmd()
        .args(["--output", "xml", "fetch", "/"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_relative_endpoint_without_base_url() {
    let output = reqflow_cmd().args(["fetch", "/users"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("base URL"), "{text}");
}

#[test]
fn test_unknown_profile() {
    let output = reqflow_cmd()
        .args(["--profile", "ghost", "fetch", "http://127.0.0.1:9/"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("ghost"));
}

#[test]
fn test_bad_param_syntax() {
    let output = reqflow_cmd()
        .args(["fetch", "http://127.0.0.1:9/users/:id", "-P", "id"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("NAME=VALUE"));
}

#[test]
fn test_connection_refused_exit_code() {
    let output = reqflow_cmd()
        .args(["--timeout", "5", "fetch", "http://127.0.0.1:9/"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7), "{}", combined_output(&output));
}

#[test]
fn test_config_path_and_show_without_file() {
    reqflow_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reqflow"));
    reqflow_cmd().args(["config", "show"]).assert().success();
}

// ── Requests against a mock server ──────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_fills_params_query_and_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/7"))
        .and(query_param("verbose", "true"))
        .and(header("authorization", "Bearer t0k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "ada"})))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri();
    let output = reqflow_cmd()
        .args([
            "--base-url",
            base.as_str(),
            "--token",
            "t0k",
            "-o",
            "json-compact",
            "fetch",
            "/users/:id",
            "-P",
            "id=7",
            "-Q",
            "verbose=true",
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), r#"{"id":7,"name":"ada"}"#);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_posts_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(body_json(json!({"name": "widget"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": true})))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri();
    reqflow_cmd()
        .args([
            "-b",
            base.as_str(),
            "-o",
            "yaml",
            "fetch",
            "/items",
            "-X",
            "post",
            "-d",
            r#"{"name":"widget"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("created: true"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_errors_map_to_exit_codes() {
    let server = MockServer::start().await;
    Mock::given(path("/secret"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let base = server.uri();
    for (endpoint, code) in [("/secret", 3), ("/missing", 4), ("/broken", 1)] {
        let output = reqflow_cmd()
            .args(["-b", base.as_str(), "fetch", endpoint])
            .output()
            .unwrap();
        assert_eq!(
            output.status.code(),
            Some(code),
            "{endpoint}: {}",
            combined_output(&output)
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeout_exit_code() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let base = server.uri();
    let output = reqflow_cmd()
        .args(["-b", base.as_str(), "--timeout", "1", "fetch", "/slow"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(8), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_retry_recovers_from_server_errors() {
    let server = MockServer::start().await;
    Mock::given(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri();
    reqflow_cmd()
        .args([
            "-b",
            base.as_str(),
            "-o",
            "plain",
            "fetch",
            "/flaky",
            "--retry",
            "2",
            "--retry-time",
            "10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::diff("ok\n"));
}

// ── Named commands from config ──────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_run_named_command_with_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/3"))
        .and(header("x-client", "reqflow"))
        .and(header("authorization", "Bearer profile-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("carol")))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &sample_config(&server.uri()));

    reqflow_cmd_in(home.path())
        .args(["-o", "plain", "run", "get-user", "-P", "id=3"])
        .assert()
        .success()
        .stdout(predicate::str::diff("carol\n"));
}

#[test]
fn test_run_unknown_command() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &sample_config("http://127.0.0.1:9"));

    let output = reqflow_cmd_in(home.path())
        .args(["run", "nope"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("commands list"));
}

#[test]
fn test_commands_list_and_show() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &sample_config("http://127.0.0.1:9"));

    reqflow_cmd_in(home.path())
        .args(["-o", "plain", "commands", "list"])
        .assert()
        .success()
        .stdout(predicate::str::diff("create-user\nget-user\n"));

    reqflow_cmd_in(home.path())
        .args(["-o", "table", "commands", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ENDPOINT").and(predicate::str::contains("retry 1")));

    reqflow_cmd_in(home.path())
        .args(["-o", "json", "commands", "show", "create-user"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""abort": "POST_/users""#)
                .and(predicate::str::contains(r#""endpoint": "/users""#)),
        );
}

#[test]
fn test_config_show_redacts_tokens() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &sample_config("http://127.0.0.1:9"));

    reqflow_cmd_in(home.path())
        .args(["-o", "table", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.local]")
                .and(predicate::str::contains("****"))
                .and(predicate::str::contains("profile-secret").not()),
        );

    reqflow_cmd_in(home.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("local *"));
}
