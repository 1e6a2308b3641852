//! Configuration validation tests
//!
//! These tests verify TOML config parsing through `run --dry-run`.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn scouter() -> Command {
    Command::cargo_bin("scouter").unwrap()
}

fn dry_run(config: &str) -> assert_cmd::assert::Assert {
    let dir = tempdir().unwrap();
    let path = dir.path().join("probe_config.toml");
    fs::write(&path, config).unwrap();

    scouter()
        .args(["run", "-f", path.to_str().unwrap(), "--dry-run"])
        .env_remove("SCOUTER_IT_TOKEN")
        .assert()
}

#[test]
fn minimal_config_validates() {
    dry_run(
        r#"
[probe]
concurrent_requests = 2
total_requests = 4

[[probe.endpoints]]
url = "https://example.com/a"

[[probe.endpoints]]
url = "https://example.com/b"
method = "post"
"#,
    )
    .success()
    .stderr(predicate::str::contains("Configuration validated"))
    .stderr(predicate::str::contains("POST https://example.com/b"))
    .stderr(predicate::str::contains("Total jobs:  8"))
    .stderr(predicate::str::contains("Timeout:     2000ms"));
}

#[test]
fn auth_type_is_reported() {
    dry_run(
        r#"
[auth]
enabled = true
type = "basic"

[auth.basic]
username = "user"
password = "pass"

[[probe.endpoints]]
url = "https://example.com"
"#,
    )
    .success()
    .stderr(predicate::str::contains("Auth:        basic"));
}

#[test]
fn empty_endpoint_list_is_rejected() {
    dry_run("[probe]\nconcurrent_requests = 2\n")
        .failure()
        .stderr(predicate::str::contains("at least one endpoint"));
}

#[test]
fn inverted_random_delay_is_rejected() {
    dry_run(
        r#"
[probe.delay_between]
enabled = true
type = "random"
min = 500
max = 100

[[probe.endpoints]]
url = "https://example.com"
"#,
    )
    .failure()
    .stderr(predicate::str::contains("exceeds max"));
}

#[test]
fn unset_environment_variable_is_rejected() {
    dry_run(
        r#"
[auth]
enabled = true
type = "api_key"

[auth.api_key]
header = "X-API-Key"
value = "${SCOUTER_IT_TOKEN}"

[[probe.endpoints]]
url = "https://example.com"
"#,
    )
    .failure()
    .stderr(predicate::str::contains("SCOUTER_IT_TOKEN"));
}

#[test]
fn malformed_toml_is_rejected() {
    dry_run("[probe\nconcurrent_requests = 2\n")
        .failure()
        .stderr(predicate::str::contains("failed to parse config file"));
}

#[test]
fn dotenv_file_supplies_variables() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join(".env"),
        "SCOUTER_IT_DOTENV_HOST=http://dotenv.local:8080\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("probe_config.toml"),
        r#"
[[probe.endpoints]]
url = "${SCOUTER_IT_DOTENV_HOST}/health"
"#,
    )
    .unwrap();

    scouter()
        .current_dir(dir.path())
        .args(["run", "-f", "probe_config.toml", "--dry-run"])
        .env_remove("SCOUTER_IT_DOTENV_HOST")
        .assert()
        .success()
        .stderr(predicate::str::contains("GET http://dotenv.local:8080/health"));
}

#[test]
fn process_environment_wins_over_dotenv() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(".env"), "SCOUTER_IT_DOTENV_PATH=from-file\n").unwrap();
    fs::write(
        dir.path().join("probe_config.toml"),
        r#"
[[probe.endpoints]]
url = "http://localhost/${SCOUTER_IT_DOTENV_PATH}"
"#,
    )
    .unwrap();

    scouter()
        .current_dir(dir.path())
        .args(["run", "-f", "probe_config.toml", "--dry-run"])
        .env("SCOUTER_IT_DOTENV_PATH", "from-process")
        .assert()
        .success()
        .stderr(predicate::str::contains("GET http://localhost/from-process"));
}

#[test]
fn debug_logs_include_source_location() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("probe_config.toml");
    fs::write(&path, "[[probe.endpoints]]\nurl = \"http://localhost/\"\n").unwrap();

    scouter()
        .args(["run", "-f", path.to_str().unwrap(), "--dry-run", "--debug"])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(predicate::str::contains("src/main.rs:"));

    scouter()
        .args(["run", "-f", path.to_str().unwrap(), "--dry-run"])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(predicate::str::contains("src/main.rs:").not());
}
