//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn isolated_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("bosun");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("BOSUN_CONFIG_PATH")
        .env_remove("BOSUN_DOMAIN")
        .env_remove("BOSUN_ACCESS_TOKEN");
    cmd
}

#[test]
fn cli_without_subcommand_prints_usage() {
    let mut cmd = cargo_bin_cmd!("bosun");
    cmd.assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn provision_rejects_invalid_domain_before_touching_the_provider() {
    let home = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = isolated_cmd(&home);
    cmd.args(["provision", "--domain", "not_a_domain", "--yes", "--quiet"])
        .env("BOSUN_ACCESS_TOKEN", "token")
        .env("BOSUN_MACHINE_BIN", "/nonexistent/bosun-machine");

    cmd.assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("invalid domain `not_a_domain`"));
}

#[test]
fn provision_reports_zero_attempt_budget() {
    let home = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = isolated_cmd(&home);
    cmd.args(["provision", "--domain", "example.com", "--yes"])
        .env("BOSUN_ACCESS_TOKEN", "token")
        .env("BOSUN_MAX_ATTEMPTS", "0");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("max_attempts must be at least 1"));
}

#[test]
fn teardown_keeps_control_host_when_swarm_host_is_unreachable() {
    let home = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = isolated_cmd(&home);
    cmd.args(["teardown", "--yes"])
        .env("BOSUN_MACHINE_BIN", "/nonexistent/bosun-machine");

    cmd.assert()
        .failure()
        .code(1)
        .stdout(
            predicate::str::contains("failed swarm")
                .and(predicate::str::contains("kept control")),
        )
        .stderr(predicate::str::contains("could not destroy 2 host(s)"));
}
