use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;

fn leadline(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("leadline").expect("binary");
    cmd.env_remove("LEADLINE_USER")
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.arg("--json").output().expect("run leadline");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json envelope")
}

fn add_task(data_dir: &Path, title: &str, assignee: &str) -> String {
    let value = json_output(
        leadline(data_dir)
            .args(["task", "add", title, "--assignee", assignee, "--priority", "high"]),
    );
    value["data"]["id"].as_str().expect("task id").to_string()
}

#[test]
fn leadline_help_works() {
    Command::cargo_bin("leadline")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("leadline"));
}

#[test]
fn subcommand_help_works() {
    for cmd in ["task", "notify", "activity"] {
        Command::cargo_bin("leadline")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn task_add_and_list() {
    let dir = tempfile::tempdir().expect("tempdir");
    let id = add_task(dir.path(), "Call Acme", "rep-1");

    let value = json_output(leadline(dir.path()).args(["task", "list", "--assignee", "rep-1"]));
    assert_eq!(value["schema_version"], "leadline.v1");
    assert_eq!(value["command"], "task list");
    assert_eq!(value["data"]["total"], 1);
    assert_eq!(value["data"]["tasks"][0]["id"], id.as_str());
    assert_eq!(value["data"]["tasks"][0]["priority"], "high");
}

#[test]
fn notify_poll_lists_assignments_for_the_user() {
    let dir = tempfile::tempdir().expect("tempdir");
    let id = add_task(dir.path(), "Send proposal", "rep-1");
    add_task(dir.path(), "Someone else's", "rep-2");

    let value = json_output(leadline(dir.path()).args(["--user", "rep-1", "notify", "poll"]));
    assert_eq!(value["data"]["unread_count"], 1);
    let notifications = value["data"]["notifications"].as_array().expect("list");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["task_id"], id.as_str());
    assert_eq!(notifications[0]["kind"], "assignment");
}

#[test]
fn notify_read_all_persists() {
    let dir = tempfile::tempdir().expect("tempdir");
    add_task(dir.path(), "Send proposal", "rep-1");

    let value = json_output(leadline(dir.path()).args(["--user", "rep-1", "notify", "read-all"]));
    assert_eq!(value["data"]["marked"], 1);

    let value = json_output(leadline(dir.path()).args(["--user", "rep-1", "notify", "poll"]));
    assert_eq!(value["data"]["unread_count"], 0);
    assert_eq!(value["data"]["notifications"][0]["is_read"], true);
}

#[test]
fn notify_read_marks_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    add_task(dir.path(), "First", "rep-1");
    add_task(dir.path(), "Second", "rep-1");

    let value = json_output(leadline(dir.path()).args(["--user", "rep-1", "notify", "poll"]));
    let target = value["data"]["notifications"][0]["id"]
        .as_str()
        .expect("id")
        .to_string();

    let value =
        json_output(leadline(dir.path()).args(["--user", "rep-1", "notify", "read", target.as_str()]));
    assert_eq!(value["data"]["marked"], 1);
    assert_eq!(value["data"]["unread_count"], 1);

    let value =
        json_output(leadline(dir.path()).args(["--user", "rep-1", "notify", "read", target.as_str()]));
    assert_eq!(value["data"]["marked"], 0);
    assert_eq!(value["data"]["unread_count"], 1);
}

#[test]
fn notify_without_user_is_a_user_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    leadline(dir.path())
        .args(["notify", "poll"])
        .assert()
        .code(2)
        .stderr(contains("--user"));
}

#[test]
fn update_unknown_task_is_a_user_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    leadline(dir.path())
        .args(["--json", "task", "update", "missing", "--status", "completed"])
        .assert()
        .code(2)
        .stdout(contains("\"status\": \"error\""));
}

#[test]
fn status_update_is_recorded_as_activity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let id = add_task(dir.path(), "Demo", "rep-1");

    json_output(leadline(dir.path()).args([
        "task",
        "update",
        id.as_str(),
        "--status",
        "in_progress",
        "--by",
        "Sam",
    ]));
    json_output(leadline(dir.path()).args([
        "activity",
        "add",
        id.as_str(),
        "--note",
        "left voicemail",
    ]));

    let value = json_output(leadline(dir.path()).args(["activity", "list", "--task", id.as_str()]));
    assert_eq!(value["data"]["total"], 2);
    let kinds: Vec<&str> = value["data"]["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .filter_map(|entry| entry["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"status_change"));
    assert!(kinds.contains(&"call"));
}

#[test]
fn invalid_config_is_a_user_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("config.toml"),
        "[notifications]\nwindow = \"0s\"\n",
    )
    .unwrap();

    leadline(dir.path())
        .args(["task", "list"])
        .assert()
        .code(2);
}

#[test]
fn watch_stops_after_requested_ticks() {
    let dir = tempfile::tempdir().expect("tempdir");
    add_task(dir.path(), "Send proposal", "rep-1");

    let value = json_output(leadline(dir.path()).args([
        "--user",
        "rep-1",
        "notify",
        "watch",
        "--ticks",
        "2",
        "--interval",
        "50ms",
    ]));
    assert_eq!(value["command"], "notify watch");
    assert_eq!(value["data"]["unread_count"], 1);
}

#[test]
fn watch_rejects_stdout_alert_log_with_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    leadline(dir.path())
        .args([
            "--user",
            "rep-1",
            "notify",
            "watch",
            "--ticks",
            "1",
            "--alert-log",
            "-",
            "--json",
        ])
        .assert()
        .code(2)
        .stdout(contains("--alert-log"));
}
