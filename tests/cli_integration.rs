//! Integration tests for the `dp` CLI.
//!
//! Each test creates a temp vault, runs `dp` as a subprocess against it,
//! and verifies stdout and/or file contents.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Get the path to the built `dp` binary.
fn dp_bin() -> PathBuf {
    // cargo test builds to target/debug/
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dp");
    path
}

const PLAN: &str = "\
# Today

- [ ] Buy milk [scheduled:: 2024-03-04T09:00] [length:: 30m]
- [ ] Write report [scheduled:: 2024-03-04] [due:: 2024-03-08]
- [ ] Plan trip [due:: 2024-03-10]
    - [ ] Book hotel
      Near the station.
    - [ ] Book train
- [ ] Old chore [scheduled:: 2024-03-01T08:00]
";

/// Create a small vault in the given directory.
fn create_test_vault(root: &Path) {
    fs::write(
        root.join(".dayplan.toml"),
        r#"# vault settings
[vault]
exclude = "^templates/"

[tasks]
field_format = "dataview"
"#,
    )
    .unwrap();
    fs::write(root.join("plan.md"), PLAN).unwrap();

    fs::create_dir_all(root.join("templates")).unwrap();
    fs::write(
        root.join("templates/daily.md"),
        "- [ ] Template task [scheduled:: 2024-03-04]\n",
    )
    .unwrap();
}

fn vault() -> TempDir {
    let dir = TempDir::new().unwrap();
    create_test_vault(dir.path());
    dir
}

/// Run `dp -C <root> args...`
fn run(root: &Path, args: &[&str]) -> Output {
    Command::new(dp_bin())
        .arg("-C")
        .arg(root)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run dp")
}

fn stdout_of(root: &Path, args: &[&str]) -> String {
    let output = run(root, args);
    assert!(
        output.status.success(),
        "dp {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

fn json_of(root: &Path, args: &[&str]) -> serde_json::Value {
    let mut args = args.to_vec();
    args.push("--json");
    serde_json::from_str(&stdout_of(root, &args)).expect("stdout is not JSON")
}

fn ids(list: &serde_json::Value) -> Vec<&str> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect()
}

// ============================================================================
// Read commands
// ============================================================================

#[test]
fn day_json_sections() {
    let dir = vault();
    let day = json_of(dir.path(), &["day", "2024-03-04", "--now", "2024-03-04T10:00"]);

    assert_eq!(day["date"], "2024-03-04");
    assert_eq!(day["now"], "2024-03-04T10:00");
    assert_eq!(ids(&day["past"]), ["plan.md::8"]);
    assert_eq!(ids(&day["all_day"]), ["plan.md::3"]);
    assert_eq!(ids(&day["upcoming"]), ["plan.md::4"]);
    assert_eq!(day["excluded"], 2);

    let blocks = day["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["start"], "2024-03-04T09:00");
    assert_eq!(blocks[0]["end"], "2024-03-04T09:30");
    assert_eq!(ids(&blocks[0]["tasks"]), ["plan.md::2"]);
}

#[test]
fn day_text_lists_sections() {
    let dir = vault();
    let out = stdout_of(dir.path(), &["day", "2024-03-04", "--now", "2024-03-04T10:00"]);
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines[0], "== 2024-03-04 (Mon) ==");
    assert!(lines.contains(&"-- Timeline --"));
    assert!(lines.contains(&"09:00-09:30"));
    assert!(lines.contains(&"  [ ] Buy milk ~30m  (plan.md::2)"));
    assert!(!out.contains("Template task"));
}

#[test]
fn day_with_events() {
    let dir = vault();
    let events = dir.path().join("events.json");
    fs::write(
        &events,
        r#"[
  {"id": "e1", "title": "Standup", "start": "2024-03-04T09:00", "end": "2024-03-04T09:15"},
  {"id": "e2", "title": "Holiday", "start": "2024-03-04", "end": "2024-03-05"}
]"#,
    )
    .unwrap();

    let day = json_of(
        dir.path(),
        &[
            "day",
            "2024-03-04",
            "--now",
            "2024-03-04T08:00",
            "--events",
            events.to_str().unwrap(),
        ],
    );
    assert_eq!(day["all_day_events"][0]["title"], "Holiday");
    let block = &day["blocks"][0];
    assert_eq!(block["start"], "2024-03-04T09:00");
    // 15m event + 30m task
    assert_eq!(block["end"], "2024-03-04T09:45");
    assert_eq!(block["events"][0]["id"], "e1");
}

#[test]
fn show_task_detail() {
    let dir = vault();
    let out = stdout_of(dir.path(), &["show", "plan.md::5"]);
    assert!(out.starts_with("[ ] Book hotel\n"));
    assert!(out.contains("in: plan.md > Today\n"));
    assert!(out.contains("parent: plan.md::4\n"));
    assert!(out.contains("Near the station."));

    let task = json_of(dir.path(), &["show", "plan.md::2"]);
    assert_eq!(task["scheduled"], "2024-03-04T09:00");
    assert_eq!(task["length"], "30m");
    assert_eq!(task["priority"], "default");
}

#[test]
fn show_unknown_task_fails() {
    let dir = vault();
    let output = run(dir.path(), &["show", "plan.md::99"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: task not found: plan.md::99"));
}

#[test]
fn tree_nests_subtasks() {
    let dir = vault();
    let out = stdout_of(dir.path(), &["tree"]);
    assert!(out.contains("[ ] Plan trip due 2024-03-10  (plan.md::4)\n  [ ] Book hotel  (plan.md::5)\n  [ ] Book train  (plan.md::7)\n"));

    let tree = json_of(dir.path(), &["tree"]);
    assert_eq!(
        ids(&tree),
        ["plan.md::2", "plan.md::3", "plan.md::4", "plan.md::8"]
    );
    assert_eq!(ids(&tree[2]["subtasks"]), ["plan.md::5", "plan.md::7"]);
}

// ============================================================================
// Write commands
// ============================================================================

#[test]
fn schedule_rewrites_line() {
    let dir = vault();
    let out = stdout_of(
        dir.path(),
        &["schedule", "plan.md::2", "2024-03-05T14:07", "--round"],
    );
    assert_eq!(out, "plan.md::2 scheduled for 2024-03-05T14:00\n");

    let text = fs::read_to_string(dir.path().join("plan.md")).unwrap();
    assert!(text.contains("- [ ] Buy milk [scheduled:: 2024-03-05T14:00] [length:: 30m]\n"));
    // Neighbouring lines untouched
    assert!(text.contains("- [ ] Write report [scheduled:: 2024-03-04] [due:: 2024-03-08]\n"));
}

#[test]
fn schedule_none_clears() {
    let dir = vault();
    let out = stdout_of(dir.path(), &["schedule", "plan.md::3", "none"]);
    assert_eq!(out, "plan.md::3 unscheduled\n");
    let text = fs::read_to_string(dir.path().join("plan.md")).unwrap();
    assert!(text.contains("- [ ] Write report [due:: 2024-03-08]\n"));
}

#[test]
fn schedule_rejects_bad_date() {
    let dir = vault();
    let output = run(dir.path(), &["schedule", "plan.md::2", "tomorrow"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(fs::read_to_string(dir.path().join("plan.md")).unwrap(), PLAN);
}

#[test]
fn reformat_to_tasks_format() {
    let dir = vault();
    let out = stdout_of(dir.path(), &["reformat", "plan.md::3", "--format", "tasks"]);
    assert_eq!(out, "- [ ] Write report ⏳ 2024-03-04 📅 2024-03-08\n");

    let text = fs::read_to_string(dir.path().join("plan.md")).unwrap();
    assert!(text.contains("\n- [ ] Write report ⏳ 2024-03-04 📅 2024-03-08\n"));

    // Still read back the same under the configured format
    let task = json_of(dir.path(), &["show", "plan.md::3"]);
    assert_eq!(task["scheduled"], "2024-03-04");
    assert_eq!(task["due"], "2024-03-08");
}

#[test]
fn delete_removes_subtasks_and_notes() {
    let dir = vault();
    let out = stdout_of(dir.path(), &["delete", "plan.md::4", "--yes"]);
    assert_eq!(out, "deleted 3 task(s)\n");

    let text = fs::read_to_string(dir.path().join("plan.md")).unwrap();
    assert_eq!(
        text,
        "\
# Today

- [ ] Buy milk [scheduled:: 2024-03-04T09:00] [length:: 30m]
- [ ] Write report [scheduled:: 2024-03-04] [due:: 2024-03-08]
- [ ] Old chore [scheduled:: 2024-03-01T08:00]
"
    );
}

#[test]
fn delete_without_confirmation_keeps_file() {
    let dir = vault();
    let output = Command::new(dp_bin())
        .arg("-C")
        .arg(dir.path())
        .args(["delete", "plan.md::4"])
        .stdin(std::process::Stdio::null())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "cancelled\n");
    assert_eq!(fs::read_to_string(dir.path().join("plan.md")).unwrap(), PLAN);
}

#[test]
fn collapse_persists_between_runs() {
    let dir = vault();
    let out = stdout_of(dir.path(), &["collapse", "plan.md::4"]);
    assert_eq!(out, "plan.md::4 collapsed\n");
    assert!(dir.path().join(".dayplan-state.json").exists());

    let tree = stdout_of(dir.path(), &["tree"]);
    assert!(tree.contains("+ [ ] Plan trip"));
    assert!(!tree.contains("Book hotel"));

    let all = stdout_of(dir.path(), &["tree", "--all"]);
    assert!(all.contains("Book hotel"));

    let json = json_of(dir.path(), &["tree"]);
    assert_eq!(json[2]["collapsed"], true);

    let out = stdout_of(dir.path(), &["collapse", "plan.md::4"]);
    assert_eq!(out, "plan.md::4 expanded\n");
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_field_format_keeps_comments() {
    let dir = vault();
    let out = stdout_of(dir.path(), &["config", "field-format", "full-calendar"]);
    assert_eq!(out, "field format set to full-calendar\n");

    let toml = fs::read_to_string(dir.path().join(".dayplan.toml")).unwrap();
    assert!(toml.starts_with("# vault settings\n"));
    assert!(toml.contains("field_format = \"full-calendar\""));

    // Writes now use the new format
    stdout_of(dir.path(), &["schedule", "plan.md::2", "2024-03-04T11:00"]);
    let text = fs::read_to_string(dir.path().join("plan.md")).unwrap();
    assert!(text.contains(
        "- [ ] Buy milk [date:: 2024-03-04] [startTime:: 11:00] [endTime:: 11:30]\n"
    ));
}

#[test]
fn config_rejects_unknown_format() {
    let dir = vault();
    let output = run(dir.path(), &["config", "field-format", "markdown"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn config_show_json() {
    let dir = vault();
    let config = json_of(dir.path(), &["config", "show"]);
    assert_eq!(config["tasks"]["field_format"], "dataview");
    assert_eq!(config["vault"]["exclude"], "^templates/");
}

#[test]
fn missing_vault_dir_fails() {
    let dir = vault();
    let output = Command::new(dp_bin())
        .args(["-C"])
        .arg(dir.path().join("nope"))
        .arg("tree")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot resolve -C path"));
}
