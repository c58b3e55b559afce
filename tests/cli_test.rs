//! End-to-end tests of the `autolab` binary
//!
//! Each test runs with a temporary HOME so no real configuration, token
//! file or keyring entry is touched.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn autolab(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("autolab").unwrap();
    cmd.env_clear()
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env("XDG_DATA_HOME", home.path().join(".local/share"))
        .env("AUTOLAB_CLIENT_ID", "test-client-id")
        .env("AUTOLAB_CLIENT_SECRET", "test-client-secret")
        .env("AUTOLAB_BASE_URI", "http://127.0.0.1:9")
        .env("AUTOLAB_TOKEN_STORE", "file")
        .current_dir(home.path());
    cmd
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    autolab(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("setup"))
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("asmts"));
}

#[test]
fn test_command_without_setup_suggests_setup() {
    let home = TempDir::new().unwrap();
    autolab(&home)
        .arg("courses")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No user set up on this client yet"))
        .stderr(predicate::str::contains("autolab setup"));
}

#[test]
fn test_missing_client_credentials_is_config_error() {
    let home = TempDir::new().unwrap();
    autolab(&home)
        .env_remove("AUTOLAB_CLIENT_ID")
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("client_id"));
}

#[test]
fn test_explicit_config_file_must_exist() {
    let home = TempDir::new().unwrap();
    autolab(&home)
        .arg("--config")
        .arg(home.path().join("missing.yaml"))
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_config_file_supplies_credentials() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("autolab.yaml");
    std::fs::write(
        &config,
        "server:\n  base_uri: http://127.0.0.1:9\n  client_id: from-file\n  client_secret: s3cret\nauth:\n  token_store: file\n",
    )
    .unwrap();

    autolab(&home)
        .env_remove("AUTOLAB_CLIENT_ID")
        .env_remove("AUTOLAB_CLIENT_SECRET")
        .env("AUTOLAB_CONFIG", &config)
        .arg("courses")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No user set up on this client yet"));
}

#[test]
fn test_bad_target_is_rejected_before_network() {
    let home = TempDir::new().unwrap();
    let data = home.path().join(".local/share/autolab");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("tokens.json"),
        r#"{"access_token":"a","refresh_token":"r"}"#,
    )
    .unwrap();

    autolab(&home)
        .args(["problems", "no-colon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("course:assessment"));
}

#[test]
fn test_status_outside_assessment_directory_succeeds_offline() {
    let home = TempDir::new().unwrap();
    let data = home.path().join(".local/share/autolab");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("tokens.json"),
        r#"{"access_token":"a","refresh_token":"r"}"#,
    )
    .unwrap();

    autolab(&home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not currently in any assessment directory"))
        .stdout(predicate::str::contains("up to 8 levels"));
}
