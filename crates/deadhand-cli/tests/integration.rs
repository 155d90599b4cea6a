#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// Zero-length grace and time lock let a whole release run inside one test
// without waiting on the wall clock.
const FIXTURE: &str = r#"
owners:
  - id: alice
vaults:
  - id: family
    owner_id: alice
    title: Family documents
    participants:
      - { id: w1, role: witness }
      - { id: carol, role: beneficiary }
    rules: { inactivity_period: 30, grace_period: 0, time_lock: 0, approvals_required: 1 }
  - id: notes
    owner_id: alice
    title: Notes
"#;

fn deadhand(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("deadhand").unwrap();
    cmd.current_dir(dir.path())
        .env("DEADHAND_ROOT", dir.path())
        .env_remove("DEADHAND_TIME_UNIT");
    cmd
}

fn init_project(dir: &TempDir) {
    deadhand(dir)
        .args(["init", "--time-unit", "seconds"])
        .assert()
        .success();
    let fixture = dir.path().join("fixture.yaml");
    std::fs::write(&fixture, FIXTURE).unwrap();
    deadhand(dir)
        .args(["import", fixture.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Imported 1 owner(s), 2 vault(s), 1 rule set(s)",
        ));
}

fn json(dir: &TempDir, args: &[&str]) -> serde_json::Value {
    let out = deadhand(dir).arg("--json").args(args).assert().success();
    serde_json::from_slice(&out.get_output().stdout).unwrap()
}

fn trigger(dir: &TempDir) -> String {
    let release = json(dir, &["trigger", "family"]);
    release["id"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// deadhand init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_data_dir() {
    let dir = TempDir::new().unwrap();
    deadhand(&dir).arg("init").assert().success();

    assert!(dir.path().join(".deadhand").is_dir());
    assert!(dir.path().join(".deadhand/config.yaml").exists());
    assert!(dir.path().join(".deadhand/releases.db").exists());
    assert!(dir.path().join(".deadhand/audit.db").exists());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    deadhand(&dir).arg("init").assert().success();
    deadhand(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));
}

#[test]
fn init_records_time_unit_override() {
    let dir = TempDir::new().unwrap();
    deadhand(&dir)
        .args(["init", "--time-unit", "minutes"])
        .assert()
        .success();
    let config = std::fs::read_to_string(dir.path().join(".deadhand/config.yaml")).unwrap();
    assert!(config.contains("time_unit: minutes"));
}

#[test]
fn commands_require_init() {
    let dir = TempDir::new().unwrap();
    deadhand(&dir)
        .args(["status", "family"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("deadhand init"));
}

// ---------------------------------------------------------------------------
// Release lifecycle
// ---------------------------------------------------------------------------

#[test]
fn release_runs_to_completion() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let id = trigger(&dir);

    deadhand(&dir)
        .args(["confirm", &id, "--witness", "w1", "--decision", "approve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("grace"));

    deadhand(&dir)
        .args(["tick", "grace"])
        .assert()
        .success()
        .stdout(predicate::str::contains("transitioned 1"));

    deadhand(&dir)
        .args(["confirm", &id, "--witness", "w1", "--decision", "approve"])
        .assert()
        .success()
        .stdout(predicate::str::contains("release is approved"));

    deadhand(&dir)
        .args(["tick", "time-lock"])
        .assert()
        .success();

    let status = json(&dir, &["status", "family"]);
    assert_eq!(status["is_released"], true);
    assert_eq!(status["status"], "released");

    let shown = json(&dir, &["show", &id]);
    assert_eq!(shown["confirmations"][0]["participant_id"], "w1");

    deadhand(&dir)
        .args(["audit", "verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("intact"));
    let entries = json(&dir, &["audit", "list", "--release", &id]);
    assert!(entries.as_array().unwrap().len() >= 4);
}

#[test]
fn non_witness_cannot_confirm() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let id = trigger(&dir);
    deadhand(&dir).args(["tick", "grace"]).assert().success();

    deadhand(&dir)
        .args(["confirm", &id, "--witness", "carol", "--decision", "approve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("carol"));
}

#[test]
fn rejection_is_terminal() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let id = trigger(&dir);
    deadhand(&dir).args(["tick", "all"]).assert().success();

    deadhand(&dir)
        .args([
            "confirm", &id, "--witness", "w1", "--decision", "reject", "--comment", "owner is fine",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("release is rejected"));

    let listed = json(&dir, &["releases", "--status", "rejected"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[test]
fn owner_revokes_then_resets() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let id = trigger(&dir);

    deadhand(&dir)
        .args(["revoke", &id, "--actor", "w1"])
        .assert()
        .failure();

    deadhand(&dir)
        .args(["reset", "family"])
        .assert()
        .failure();

    deadhand(&dir)
        .args(["revoke", &id, "--actor", "alice", "--reason", "still here"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Revoked release"));

    deadhand(&dir)
        .args(["reset", "family"])
        .assert()
        .success();

    let status = json(&dir, &["status", "family"]);
    assert_eq!(status["has_release"], false);
}

#[test]
fn vault_without_rules_cannot_trigger() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    deadhand(&dir)
        .args(["trigger", "notes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("notes"));
}

#[test]
fn rules_cannot_change_during_a_release() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let id = trigger(&dir);

    let changed = dir.path().join("changed.yaml");
    std::fs::write(&changed, FIXTURE.replace("time_lock: 0", "time_lock: 500")).unwrap();
    deadhand(&dir)
        .args(["import", changed.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already in progress"));

    // The release still runs on the rules it opened with.
    deadhand(&dir).args(["tick", "grace"]).assert().success();
    let confirmed = json(&dir, &["confirm", &id, "--witness", "w1", "--decision", "approve"]);
    assert_eq!(confirmed["release"]["time_lock_secs"], 0);
    deadhand(&dir).args(["tick", "time-lock"]).assert().success();
    assert_eq!(json(&dir, &["status", "family"])["is_released"], true);
}

#[test]
fn import_rejects_periods_past_the_calendar() {
    let dir = TempDir::new().unwrap();
    deadhand(&dir)
        .args(["init", "--time-unit", "days"])
        .assert()
        .success();
    let fixture = dir.path().join("fixture.yaml");
    let huge = FIXTURE.replace("inactivity_period: 30", "inactivity_period: 4000000000");
    std::fs::write(&fixture, huge).unwrap();
    deadhand(&dir)
        .args(["import", fixture.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid rule set"));
}

#[test]
fn bad_arguments_are_rejected_by_the_parser() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    deadhand(&dir).args(["tick", "cleanup"]).assert().failure();
    deadhand(&dir)
        .args(["show", "not-a-uuid"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// Owner activity
// ---------------------------------------------------------------------------

#[test]
fn activity_moves_owner_from_untracked_to_active() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let before = json(&dir, &["inactivity", "alice"]);
    let states: Vec<_> = before["vaults"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["status"].as_str().unwrap().to_string())
        .collect();
    assert!(states.contains(&"untracked".to_string()));
    assert!(states.contains(&"no_rule".to_string()));

    deadhand(&dir).args(["activity", "alice"]).assert().success();

    deadhand(&dir)
        .args(["inactivity", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("active"))
        .stdout(predicate::str::contains("left"));
}

// ---------------------------------------------------------------------------
// deadhand config
// ---------------------------------------------------------------------------

#[test]
fn config_validate_default_is_clean() {
    let dir = TempDir::new().unwrap();
    deadhand(&dir).arg("init").assert().success();
    deadhand(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));
}

#[test]
fn config_validate_flags_empty_webhook() {
    let dir = TempDir::new().unwrap();
    deadhand(&dir).arg("init").assert().success();
    std::fs::write(
        dir.path().join(".deadhand/config.yaml"),
        "version: 1\nnotify:\n  type: webhook\n  url: \"\"\n",
    )
    .unwrap();
    deadhand(&dir)
        .args(["config", "validate"])
        .assert()
        .stdout(predicate::str::contains("webhook"));
}
