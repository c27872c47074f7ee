//! Integration tests for the `ledweave` CLI binary.
//!
//! Parsing, help output, completions, the ToS gate, config round-trips,
//! and full command flows against the in-process simulated cloud. No
//! real Weave account is required anywhere.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `ledweave` binary with env isolation.
///
/// Clears all `LEDWEAVE_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn ledweave_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ledweave");
    cmd.env("HOME", "/tmp/ledweave-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/ledweave-cli-test-nonexistent")
        .env_remove("LEDWEAVE_CONFIG")
        .env_remove("LEDWEAVE_ENDPOINT")
        .env_remove("LEDWEAVE_ACCESS_TOKEN")
        .env_remove("LEDWEAVE_DEVICE_NAME")
        .env_remove("LEDWEAVE_SIMULATE")
        .env_remove("LEDWEAVE_TIMEOUT")
        .env_remove("LEDWEAVE_OUTPUT")
        .env_remove("LEDWEAVE_TOS_ACCEPTED")
        .env_remove("LEDWEAVE_CLOUD__ENDPOINT")
        .env_remove("LEDWEAVE_CLOUD__ACCESS_TOKEN")
        .env_remove("LEDWEAVE_CLOUD__SIMULATE");
    cmd
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
    let output = ledweave_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    ledweave_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("LED")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("toggle"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    ledweave_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ledweave"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    ledweave_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    ledweave_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = ledweave_cmd().arg("frobnicate").output().unwrap();
    assert!(
        !output.status.success(),
        "Expected failure for invalid subcommand"
    );
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("unrecognized") || text.contains("frobnicate"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_network_commands_refuse_without_tos() {
    let output = ledweave_cmd().arg("leds").output().unwrap();
    assert_eq!(
        output.status.code(),
        Some(1),
        "Expected general failure before any cloud contact"
    );
    let text = combined_output(&output);
    assert!(
        text.contains("terms of service") || text.contains("accept-tos"),
        "Expected the ToS gate message:\n{text}"
    );
}

#[test]
fn test_devices_without_credentials_fails_auth() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledweave.toml");
    std::fs::write(&path, "tos_accepted = true\n").unwrap();

    let output = ledweave_cmd()
        .args(["--config", path.to_str().unwrap(), "devices"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "Expected auth exit code");
    let text = combined_output(&output);
    assert!(
        text.contains("access token"),
        "Expected missing-token message:\n{text}"
    );
}

// ── Simulated cloud flows ───────────────────────────────────────────

#[test]
fn test_simulate_devices_lists_demo_cloud() {
    ledweave_cmd()
        .args(["--simulate", "devices"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ledflasher")
                .and(predicate::str::contains("workbench flasher"))
                .and(predicate::str::contains("thermostat"))
                .and(predicate::str::contains("LED Flasher"))
                .and(predicate::str::contains("unknown device type")),
        );
}

#[test]
fn test_simulate_devices_json_output() {
    ledweave_cmd()
        .args(["--simulate", "--output", "json", "devices"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\"").and(predicate::str::contains("ledflasher")));
}

#[test]
fn test_simulate_leds_shows_panel() {
    // The demo flasher has four LEDs, all off.
    ledweave_cmd()
        .args(["--simulate", "leds"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Index")
                .and(predicate::str::contains("3"))
                .and(predicate::str::contains("off"))
                .and(predicate::str::contains("on").not()),
        );
}

#[test]
fn test_simulate_set_reports_new_state() {
    ledweave_cmd()
        .args(["--simulate", "set", "0", "on"])
        .assert()
        .success()
        .stderr(predicate::str::contains("LED 0 set to on"));
}

#[test]
fn test_simulate_toggle_flips_off_to_on() {
    ledweave_cmd()
        .args(["--simulate", "toggle", "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("LED 1 is now on"));
}

#[test]
fn test_simulate_toggle_out_of_range_is_usage_error() {
    let output = ledweave_cmd()
        .args(["--simulate", "toggle", "99"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected usage exit code");
    let text = combined_output(&output);
    assert!(
        text.contains("out of range"),
        "Expected out-of-range message:\n{text}"
    );
}

#[test]
fn test_simulate_missing_target_fails_not_found() {
    let output = ledweave_cmd()
        .args(["--simulate", "--device", "toaster", "--timeout", "1", "leds"])
        .output()
        .unwrap();
    assert_eq!(
        output.status.code(),
        Some(4),
        "Expected not-found exit code"
    );
    let text = combined_output(&output);
    assert!(
        text.contains("toaster"),
        "Expected the missing device name:\n{text}"
    );
}

#[test]
fn test_simulate_device_without_flasher_trait() {
    // The demo thermostat is discoverable but has no `_ledflasher`
    // component, so its state tree carries no LED list.
    let output = ledweave_cmd()
        .args(["--simulate", "--device", "thermostat", "leds"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1), "Expected general exit code");
    let text = combined_output(&output);
    assert!(
        text.contains("LED list"),
        "Expected missing-LED-state message:\n{text}"
    );
}

// ── Config round-trips ──────────────────────────────────────────────

#[test]
fn test_config_show_without_file_succeeds() {
    ledweave_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("device_name"));
}

#[test]
fn test_config_path_respects_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");

    ledweave_cmd()
        .args(["--config", path.to_str().unwrap(), "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_accept_tos_then_set_device() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledweave.toml");
    let path_str = path.to_str().unwrap();

    ledweave_cmd()
        .args(["--config", path_str, "config", "accept-tos"])
        .assert()
        .success()
        .stderr(predicate::str::contains("accepted"));

    ledweave_cmd()
        .args(["--config", path_str, "config", "set-device", "garage flasher"])
        .assert()
        .success()
        .stderr(predicate::str::contains("garage flasher"));

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("tos_accepted = true"), "{contents}");
    assert!(contents.contains("device_name = \"garage flasher\""), "{contents}");

    // The gate now passes; the next failure is missing credentials.
    let output = ledweave_cmd()
        .args(["--config", path_str, "devices"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "Expected auth exit code");
}

#[test]
fn test_config_set_device_rejects_blank_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledweave.toml");

    let output = ledweave_cmd()
        .args(["--config", path.to_str().unwrap(), "config", "set-device", "  "])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected usage exit code");
}

// ── Subcommand help discovery ───────────────────────────────────────

#[test]
fn test_config_subcommands_exist() {
    ledweave_cmd()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("show"))
                .and(predicate::str::contains("path"))
                .and(predicate::str::contains("set-device"))
                .and(predicate::str::contains("accept-tos")),
        );
}

#[test]
fn test_global_flags_parse_together() {
    ledweave_cmd()
        .args([
            "--simulate",
            "--output",
            "json",
            "--verbose",
            "--timeout",
            "5",
            "devices",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\""));
}
