mod common;

use std::fs;

use anyhow::Result;
use common::Project;
use predicates::str::contains;
use pretty_assertions::assert_eq;
use serde_json::Value;

fn manifest(project: &Project) -> Result<Value> {
    Ok(serde_json::from_str(&fs::read_to_string(project.manifest_path())?)?)
}

#[test]
fn init_without_repos_fails() -> Result<()> {
    let project = Project::new()?;
    project
        .cmd()?
        .args(["state", "init"])
        .assert()
        .failure()
        .stderr(contains("does not exist"));
    Ok(())
}

#[test]
fn init_next_mark_flow() -> Result<()> {
    let project = Project::new()?;
    project.add_repo("langgraph")?;
    project.add_repo("crewai")?;
    project.add_repo("autogen")?;

    let stdout = project.stdout(&["state", "init"])?;
    assert!(stdout.contains("State initialized. Tracking 3 frameworks."));

    let written = manifest(&project)?;
    assert_eq!(written["frameworks"]["crewai"]["status"], "pending");
    assert_eq!(written["frameworks"]["crewai"]["path"], "repos/crewai");

    assert_eq!(project.stdout(&["state", "next"])?, "autogen\n");
    assert_eq!(
        project.stdout(&["state", "next", "--limit", "5"])?,
        "autogen crewai langgraph\n"
    );

    let stdout = project.stdout(&["state", "mark", "autogen", "in_progress"])?;
    assert_eq!(stdout, "Updated 'autogen' to in_progress.\n");
    assert_eq!(
        project.stdout(&["state", "next", "--limit", "5"])?,
        "crewai langgraph\n"
    );
    Ok(())
}

#[test]
fn mark_rejects_unknown_framework_and_status() -> Result<()> {
    let project = Project::new()?;
    project.add_repo("crewai")?;
    project.stdout(&["state", "init"])?;

    project
        .cmd()?
        .args(["state", "mark", "nope", "completed"])
        .assert()
        .failure()
        .stderr(contains("framework 'nope' not found in state"));

    project
        .cmd()?
        .args(["state", "mark", "crewai", "done"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("invalid status 'done'"));
    Ok(())
}

#[test]
fn status_table_and_json() -> Result<()> {
    let project = Project::new()?;
    assert!(project
        .stdout(&["state", "status"])?
        .contains("No frameworks tracked. Run 'init' first."));

    project.add_repo("crewai")?;
    project.add_repo("autogen")?;
    project.stdout(&["state", "init"])?;
    project.stdout(&["state", "mark", "crewai", "completed"])?;

    let table = project.stdout(&["state", "status"])?;
    let lines: Vec<_> = table.lines().collect();
    assert!(lines[0].starts_with("FRAMEWORK"));
    assert!(lines[2].starts_with("autogen") && lines[2].contains("pending"));
    assert!(lines[3].starts_with("crewai") && lines[3].contains("completed"));

    let json: Value =
        serde_json::from_str(&project.stdout(&["state", "status", "--format", "json"])?)?;
    assert_eq!(json["frameworks"]["crewai"]["status"], "completed");
    Ok(())
}

#[test]
fn reset_running_cleans_partial_output() -> Result<()> {
    let project = Project::new()?;
    project.add_repo("crewai")?;
    project.add_repo("autogen")?;
    project.stdout(&["state", "init"])?;
    project.stdout(&["state", "mark", "crewai", "in_progress"])?;

    let partial = project.path().join("forensics-output/frameworks/crewai");
    fs::create_dir_all(&partial)?;
    fs::write(partial.join("codebase-map.json"), "{}")?;

    let stdout = project.stdout(&["state", "reset-running"])?;
    assert!(stdout.contains("Cleaned up partial output for 'crewai'"));
    assert!(stdout.contains("Reset 1 in-progress frameworks to pending."));
    assert!(!partial.exists());
    assert_eq!(manifest(&project)?["frameworks"]["crewai"]["status"], "pending");
    Ok(())
}

#[test]
fn phases_are_recorded_per_framework() -> Result<()> {
    let project = Project::new()?;
    let stdout = project.stdout(&["state", "phase", "crewai", "mapping"])?;
    assert!(stdout.contains("Next phase: phase1."));

    let state: Value = serde_json::from_str(&fs::read_to_string(
        project.path().join("forensics-output/.state/crewai.state.json"),
    )?)?;
    assert_eq!(state["framework"], "crewai");
    assert!(state["phases"]["mapping"].is_string());

    let shown = project.stdout(&["state", "show", "crewai"])?;
    assert!(shown.contains("not tracked"));
    assert!(shown.contains("Next: phase1"));
    Ok(())
}

#[test]
fn hand_edited_manifest_keys_survive() -> Result<()> {
    let project = Project::new()?;
    fs::create_dir_all(project.path().join("forensics-output/.state"))?;
    fs::write(
        project.manifest_path(),
        r#"{"frameworks": {"crewai": {"status": "pending", "path": "repos/crewai", "owner": "ops"}}, "run": 3}"#,
    )?;

    project.stdout(&["state", "mark", "crewai", "failed"])?;
    let written = manifest(&project)?;
    assert_eq!(written["run"], 3);
    assert_eq!(written["frameworks"]["crewai"]["owner"], "ops");
    assert_eq!(written["frameworks"]["crewai"]["status"], "failed");
    Ok(())
}

#[test]
fn entry_without_status_does_not_wipe_the_manifest() -> Result<()> {
    let project = Project::new()?;
    project.add_repo("crewai")?;
    project.add_repo("autogen")?;
    fs::create_dir_all(project.path().join("forensics-output/.state"))?;
    fs::write(
        project.manifest_path(),
        r#"{
  "run": 3,
  "frameworks": {
    "crewai": {"status": "completed", "path": "repos/crewai", "owner": "ops"},
    "autogen": {"path": "repos/autogen"}
  }
}"#,
    )?;

    let stdout = project.stdout(&["state", "init"])?;
    assert!(stdout.contains("Tracking 2 frameworks."));

    let written = manifest(&project)?;
    assert_eq!(written["run"], 3);
    assert_eq!(written["frameworks"]["crewai"]["status"], "completed");
    assert_eq!(written["frameworks"]["crewai"]["owner"], "ops");
    assert_eq!(
        written["frameworks"]["autogen"],
        serde_json::json!({"path": "repos/autogen"})
    );

    let table = project.stdout(&["state", "status"])?;
    assert!(table.contains("unreadable"));

    project.stdout(&["state", "mark", "autogen", "in_progress"])?;
    let written = manifest(&project)?;
    assert_eq!(written["frameworks"]["autogen"]["status"], "in_progress");
    assert_eq!(written["frameworks"]["autogen"]["path"], "repos/autogen");
    assert_eq!(written["frameworks"]["crewai"]["status"], "completed");
    Ok(())
}

#[test]
fn reset_running_never_deletes_outside_the_frameworks_dir() -> Result<()> {
    let project = Project::new()?;
    fs::create_dir_all(project.path().join("forensics-output/.state"))?;
    fs::write(
        project.manifest_path(),
        r#"{"frameworks": {"../victim": {"status": "in_progress", "path": "repos/victim"}}}"#,
    )?;
    let sibling = project.path().join("forensics-output/victim");
    fs::create_dir_all(&sibling)?;
    fs::write(sibling.join("keep.md"), "keep")?;

    let stdout = project.stdout(&["state", "reset-running"])?;
    assert!(stdout.contains("Reset 1 in-progress frameworks to pending."));
    assert!(!stdout.contains("Cleaned up"));
    assert!(sibling.join("keep.md").exists());
    assert_eq!(manifest(&project)?["frameworks"]["../victim"]["status"], "pending");
    Ok(())
}

#[test]
fn init_reports_vanished_frameworks_once() -> Result<()> {
    let project = Project::new()?;
    project.add_repo("crewai")?;
    project.add_repo("autogen")?;
    project.stdout(&["state", "init"])?;
    fs::remove_dir_all(project.path().join("repos/autogen"))?;

    let output = project.cmd()?.args(["state", "init"]).assert().success();
    let stderr = String::from_utf8_lossy(&output.get_output().stderr).into_owned();
    assert_eq!(stderr.matches("autogen").count(), 1);
    assert!(stderr.contains("not found in repos: autogen"));
    Ok(())
}
