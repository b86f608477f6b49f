mod common;

use anyhow::Result;
use common::Project;
use predicates::str::contains;
use serde_json::Value;

#[test]
fn skills_are_listed_by_phase() -> Result<()> {
    let project = Project::new()?;
    project.add_skill(
        "resilience-analysis",
        "---\nname: resilience-analysis\ndescription: Failure handling\n---\nBody\n",
    )?;
    project.add_skill("memory-analysis", "# Memory\n")?;

    let stdout = project.stdout(&["skills"])?;
    let engineering = stdout.find("Phase 1 (engineering):").expect("phase 1 header");
    let cognitive = stdout.find("Phase 2 (cognitive):").expect("phase 2 header");
    let resilience = stdout.find("resilience-analysis").expect("resilience listed");
    let memory = stdout.find("memory-analysis").expect("memory listed");
    assert!(engineering < resilience && resilience < cognitive && cognitive < memory);
    assert!(stdout.contains("Failure handling"));

    let json: Value = serde_json::from_str(&project.stdout(&["skills", "--format", "json"])?)?;
    let skills = json["skills"].as_array().expect("skills array");
    assert_eq!(skills.len(), 2);
    assert_eq!(skills[0]["name"], "memory-analysis");
    assert_eq!(skills[0]["phase"], "cognitive");
    Ok(())
}

#[test]
fn doctor_passes_on_complete_layout() -> Result<()> {
    let project = Project::new()?;
    project
        .cmd()?
        .arg("doctor")
        .assert()
        .success()
        .stdout(contains("Everything needed to build prompts is in place."));
    Ok(())
}

#[test]
fn doctor_fails_without_role_contexts() -> Result<()> {
    let project = Project::new()?;
    std::fs::remove_file(project.path().join(common::REFERENCES).join("skill-agent.md"))?;
    project
        .cmd()?
        .arg("doctor")
        .assert()
        .failure()
        .stdout(contains("skill-agent.md missing"));
    Ok(())
}

#[test]
fn config_init_refuses_to_overwrite() -> Result<()> {
    let project = Project::new()?;
    project.cmd()?.args(["config", "init"]).assert().success();
    assert!(project.path().join(".forensics.yaml").is_file());

    project
        .cmd()?
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(contains("--force"));
    project.cmd()?.args(["config", "init", "--force"]).assert().success();
    Ok(())
}

#[test]
fn config_show_reflects_environment() -> Result<()> {
    let project = Project::new()?;
    project
        .cmd()?
        .env("FORENSICS_REPOS_DIR", "checkouts")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("# built-in defaults"))
        .stdout(contains("repos_dir: checkouts"));
    Ok(())
}

#[test]
fn root_flag_selects_project() -> Result<()> {
    let project = Project::new()?;
    project.add_repo("crewai")?;
    let elsewhere = tempfile::TempDir::new()?;
    project
        .cmd()?
        .current_dir(elsewhere.path())
        .arg("--root")
        .arg(project.path())
        .args(["state", "init"])
        .assert()
        .success()
        .stdout(contains("Tracking 1 frameworks."));
    assert!(project.manifest_path().is_file());
    Ok(())
}
