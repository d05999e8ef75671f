use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Millisecond-scale timings so sim-mode runs finish quickly.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[stability]
window_size = 5
stddev_threshold = 0.3
sample_interval_ms = 10
primary_budget_ms = 2000
retry_budget_ms = 500
probe_settle_ms = 10

[correction]
band_low = 6.5
band_high = 7.5
max_attempts = 5
dose_ms = 20
mix_ms = 20
settle_ms = 20
recheck_primary_budget_ms = 1000
recheck_retry_budget_ms = 200

[schedule]
tick_ms = 50
rules = [{ kind = "interval", seconds = 1 }]

[telemetry]
device_id = "test_rig"
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn hydroctl() -> Command {
    Command::cargo_bin("hydroctl").unwrap()
}

#[test]
fn help_prints_usage() {
    hydroctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn self_check_reports_ok_in_sim_mode() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    hydroctl()
        .args(["--config", cfg.to_str().unwrap(), "self-check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("self-check: OK"));
}

#[test]
fn self_check_json_emits_status_object() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    hydroctl()
        .args(["--config", cfg.to_str().unwrap(), "--json", "self-check"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status":"ok""#));
}

#[test]
fn cycle_corrects_the_simulated_tank() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    // Sim tank starts at 6.0, below the [6.5, 7.5] band.
    hydroctl()
        .args(["--config", cfg.to_str().unwrap(), "cycle"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("cycle complete")
                .and(predicate::str::contains("adjustment made")),
        );
}

#[test]
fn missing_config_fails_with_hint() {
    hydroctl()
        .args(["--config", "/nonexistent/hydro.toml", "self-check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("How to fix"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[stability]\nwindow_size = 1\n").unwrap();
    hydroctl()
        .args(["--config", path.to_str().unwrap(), "self-check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration is invalid"));
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    hydroctl()
        .arg("irrigate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
