//! Integration tests for the xfaas CLI.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use xfaas::types::config::{Config, ProviderConfig};

fn xfaas_bin() -> Command {
    Command::cargo_bin("xfaas").expect("binary is built")
}

/// Provider backed by `sh` printing a fixed function response.
fn shell_provider(id: &str, counts: &str) -> ProviderConfig {
    let script = format!(r#"printf '%s' '{{"measurement_counts": {}}}'"#, counts);
    ProviderConfig::command(id, "sh", &["-c", &script, "sh"])
}

/// Writes a config with local shell providers and results under the temp dir.
fn write_config(tmp: &TempDir, providers: Vec<ProviderConfig>) -> std::path::PathBuf {
    let mut config = Config::default_config();
    config.general.results_dir = tmp.path().join("results");
    config.dispatch.per_call_timeout_secs = 10;
    config.dispatch.overall_timeout_secs = 20;
    config.providers = providers;

    let path = tmp.path().join("xfaas.toml");
    config.save(&path).unwrap();
    path
}

#[test]
fn test_version_command() {
    xfaas_bin()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("xfaas"));
}

#[test]
fn test_help_command() {
    xfaas_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("dispatch"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("doctor"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn test_invalid_command() {
    xfaas_bin().arg("serve").assert().failure();
}

#[test]
fn test_init_creates_config() {
    let tmp = TempDir::new().unwrap();

    xfaas_bin()
        .args(["init", "--path"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized"));

    let content = std::fs::read_to_string(tmp.path().join("xfaas.toml")).unwrap();
    assert!(content.contains("[general]"));
    assert!(content.contains("[dispatch]"));
    assert!(content.contains("[[providers]]"));
}

#[test]
fn test_dispatch_agreement_summary() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(
        &tmp,
        vec![
            shell_provider("aws", r#"{"00": 512, "11": 512}"#),
            shell_provider("gcp", r#"{"11": 512, "00": 512}"#),
        ],
    );

    xfaas_bin()
        .arg("--config")
        .arg(&config)
        .args(["-q", "dispatch", "--shots", "1024"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Consensus Reached"))
        .stdout(predicate::str::contains("2 succeeded | 0 failed"));

    let experiments = tmp.path().join("results").join("experiments");
    assert_eq!(std::fs::read_dir(experiments).unwrap().count(), 1);
}

#[test]
fn test_dispatch_json_dissent_without_saving() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(
        &tmp,
        vec![
            shell_provider("aws", r#"{"00": 512}"#),
            shell_provider("azure", r#"{"00": 511}"#),
            shell_provider("gcp", r#"{"00": 512}"#),
        ],
    );

    let output = xfaas_bin()
        .arg("--config")
        .arg(&config)
        .args(["-q", "dispatch", "--json", "--no-save"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["verdict"]["agreed"], false);
    assert_eq!(report["verdict"]["dissentingProviders"][0], "azure");
    assert_eq!(report["successCount"], 3);
    assert!(!tmp.path().join("results").exists());
}

#[test]
fn test_dispatch_provider_subset() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(
        &tmp,
        vec![
            shell_provider("aws", "1"),
            shell_provider("azure", "2"),
            shell_provider("gcp", "1"),
        ],
    );

    let output = xfaas_bin()
        .arg("--config")
        .arg(&config)
        .args(["-q", "dispatch", "--json", "--no-save", "-p", "gcp", "-p", "aws"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcomes"][0]["provider"], "gcp");
    assert_eq!(report["outcomes"][1]["provider"], "aws");
    assert_eq!(report["verdict"]["agreed"], true);
}

#[test]
fn test_dispatch_unknown_provider_fails() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, vec![shell_provider("aws", "1")]);

    xfaas_bin()
        .arg("--config")
        .arg(&config)
        .args(["-q", "dispatch", "--no-save", "--provider", "ibm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ibm"));
}

#[test]
fn test_history_lists_saved_reports() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, vec![shell_provider("aws", "1")]);

    xfaas_bin()
        .arg("--config")
        .arg(&config)
        .args(["-q", "dispatch", "--kind", "ghz"])
        .assert()
        .success();

    xfaas_bin()
        .arg("--config")
        .arg(&config)
        .args(["history", "--limit", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stored reports: 1"))
        .stdout(predicate::str::contains("ghz"));
}

#[test]
fn test_status_and_doctor_run() {
    let tmp = TempDir::new().unwrap();
    let mut disabled = shell_provider("azure", "1");
    disabled.enabled = false;
    let config = write_config(&tmp, vec![shell_provider("aws", "1"), disabled]);

    xfaas_bin()
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("aws"))
        .stdout(predicate::str::contains("azure - disabled"));

    xfaas_bin()
        .arg("--config")
        .arg(&config)
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("xfaas.toml");
    std::fs::write(&path, "[dispatch\nbroken").unwrap();

    xfaas_bin()
        .arg("--config")
        .arg(&path)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}

#[test]
fn test_verbose_and_quiet_flags() {
    xfaas_bin().args(["--verbose", "version"]).assert().success();
    xfaas_bin().args(["--quiet", "version"]).assert().success();
}
