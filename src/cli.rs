use crate::config::Config;
use crate::prompt::{PromptBuilder, Role, SkillAssignment};
use crate::registry::{LoadReport, SkillRegistry};
use crate::skill::{SkillPhase, SkillSpec};
use crate::state::{Phase, StateStore, Status};
use anyhow::{anyhow, Result};
use clap::ValueEnum;
use colored::*;
use serde_json::json;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print the orchestrator prompt
pub async fn orchestrator_prompt(config: &Config) -> Result<()> {
    let prompt = PromptBuilder::new(config).orchestrator().await?;
    println!("{prompt}");
    Ok(())
}

/// Print the framework agent prompt
pub async fn framework_prompt(
    config: &Config,
    framework_name: &str,
    source_path: &str,
    output_dir: &str,
) -> Result<()> {
    let prompt = PromptBuilder::new(config)
        .framework(framework_name, source_path, output_dir)
        .await?;
    println!("{prompt}");
    Ok(())
}

/// Print the skill agent prompt
pub async fn skill_prompt(config: &Config, assignment: &SkillAssignment<'_>) -> Result<()> {
    let prompt = PromptBuilder::new(config).skill(assignment).await?;
    println!("{prompt}");
    Ok(())
}

/// Print the synthesis agent prompt
pub async fn synthesis_prompt(config: &Config, frameworks: &[String]) -> Result<()> {
    let prompt = PromptBuilder::new(config).synthesis(frameworks).await?;
    println!("{prompt}");
    Ok(())
}

/// Start tracking the frameworks found in the repos directory
pub async fn state_init(store: &StateStore) -> Result<()> {
    let report = store.init().await?;

    if !report.missing.is_empty() {
        eprintln!(
            "{} The following frameworks are in state but not found in repos: {}",
            "Warning:".yellow(),
            report.missing.join(", ")
        );
    }

    println!("State initialized. Tracking {} frameworks.", report.tracked);
    Ok(())
}

/// Print the next pending frameworks, space separated for shell use
pub async fn state_next(store: &StateStore, limit: usize) -> Result<()> {
    let batch = store.next_batch(limit).await?;
    println!("{}", batch.join(" "));
    Ok(())
}

pub async fn state_mark(store: &StateStore, framework: &str, status: Status) -> Result<()> {
    store.mark(framework, status.clone()).await?;
    println!("Updated '{framework}' to {status}.");
    Ok(())
}

/// Show the status table
pub async fn state_status(store: &StateStore, format: OutputFormat) -> Result<()> {
    let manifest = store.load_manifest().await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    if manifest.is_empty() {
        println!("No frameworks tracked. Run 'init' first.");
        return Ok(());
    }

    println!("{:<25} {:<15}", "FRAMEWORK", "STATUS");
    println!("{}", "-".repeat(40));
    for name in manifest.names() {
        let status = match manifest.frameworks.get(name) {
            Some(entry) => {
                let status = format!("{:<15}", entry.status.as_str());
                match entry.status {
                    Status::Pending => status.normal(),
                    Status::InProgress => status.yellow(),
                    Status::Completed => status.green(),
                    Status::Failed => status.red(),
                    Status::Other(_) => status.bright_black(),
                }
            }
            None => format!("{:<15}", "unreadable").bright_black(),
        };
        println!("{name:<25} {status}");
    }

    println!();
    println!(
        "{} pending, {} in progress, {} completed, {} failed",
        manifest.count(&Status::Pending),
        manifest.count(&Status::InProgress),
        manifest.count(&Status::Completed),
        manifest.count(&Status::Failed),
    );
    Ok(())
}

/// Put interrupted frameworks back in the queue with a clean output dir
pub async fn state_reset(store: &StateStore) -> Result<()> {
    let report = store.reset_in_progress().await?;
    for dir in &report.cleaned {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("  Cleaned up partial output for '{name}'");
    }
    println!("Reset {} in-progress frameworks to pending.", report.reset.len());
    Ok(())
}

pub async fn state_phase(store: &StateStore, framework: &str, phase: Phase) -> Result<()> {
    let state = store.record_phase(framework, phase).await?;
    match state.next_phase() {
        Some(next) => println!("Recorded '{framework}' {phase}. Next phase: {next}."),
        None => println!("Recorded '{framework}' {phase}. All phases complete."),
    }
    Ok(())
}

/// Show manifest status and recorded phases of one framework
pub async fn state_show(store: &StateStore, framework: &str) -> Result<()> {
    let manifest = store.load_manifest().await?;
    let state = store.framework_state(framework).await?;

    println!("{}", framework.cyan().bold());
    match manifest.frameworks.get(framework) {
        Some(entry) => {
            println!("   Status: {}", entry.status);
            println!("   Path: {}", entry.path.display().to_string().bright_black());
            if let Some(updated) = entry.updated_at {
                println!("   Updated: {}", updated.to_rfc3339().bright_black());
            }
        }
        None if manifest.unreadable.contains_key(framework) => {
            println!("   Status: {}", "unreadable entry".yellow())
        }
        None => println!("   Status: {}", "not tracked".yellow()),
    }

    println!("   Phases:");
    for phase in Phase::ALL {
        match state.phases.get(&phase) {
            Some(at) => println!(
                "     {} {:<10} {}",
                "✅".green(),
                phase,
                at.to_rfc3339().bright_black()
            ),
            None => println!("     {} {:<10}", "⬜", phase),
        }
    }

    if let Some(next) = state.next_phase() {
        println!("   Next: {}", next.to_string().cyan());
    }
    Ok(())
}

/// List discovered skills
pub fn list_skills(
    registry: &SkillRegistry,
    report: &LoadReport,
    format: OutputFormat,
) -> Result<()> {
    let skills = registry.list_skills();

    match format {
        OutputFormat::Json => {
            let json_output = json!({
                "skills": skills.iter().map(|skill| {
                    json!({
                        "name": skill.name,
                        "description": skill.description,
                        "phase": skill.phase,
                        "path": skill.source_path,
                    })
                }).collect::<Vec<_>>()
            });
            println!("{}", serde_json::to_string_pretty(&json_output)?);
        }
        OutputFormat::Text => {
            if skills.is_empty() {
                println!("{}", "No skills found.".yellow());
                println!(
                    "   Add skill definitions under {}",
                    registry.skills_dir().join("<skill>/SKILL.md").display().to_string().cyan()
                );
            } else {
                for phase in [SkillPhase::Engineering, SkillPhase::Cognitive] {
                    let in_phase: Vec<_> = skills.iter().filter(|s| s.phase == phase).collect();
                    if in_phase.is_empty() {
                        continue;
                    }
                    println!("{}", format!("Phase {} ({phase}):", phase.number()).blue());
                    for skill in in_phase {
                        print_skill_info(skill);
                    }
                }
            }
        }
    }

    for warning in &report.warnings {
        eprintln!("{} {}: {}", "warning:".yellow(), warning.path.display(), warning.message);
    }
    for error in &report.errors {
        eprintln!("{} {}: {}", "error:".red(), error.path.display(), error.message);
    }

    Ok(())
}

fn print_skill_info(skill: &SkillSpec) {
    println!("  {}", skill.name.green());
    if let Some(description) = skill.description() {
        let first_line = description.lines().next().unwrap_or_default();
        println!("      {}", first_line.bright_black());
    }
}

/// Write the default configuration to the project root
pub async fn config_init(root: &Path, force: bool) -> Result<()> {
    let path = Config::project_config_path(root);
    if path.exists() && !force {
        return Err(anyhow!(
            "Configuration already exists at {}. Use --force to overwrite.",
            path.display()
        ));
    }

    Config::default().save_to(&path).await?;
    println!("{} {}", "Configuration written:".green(), path.display());
    Ok(())
}

/// Print the effective configuration
pub fn config_show(config: &Config) -> Result<()> {
    match &config.source {
        Some(path) => println!("# loaded from {}", path.display()),
        None => println!("# built-in defaults"),
    }
    print!("{}", config.to_yaml()?);
    Ok(())
}

/// Check the project layout the prompts and state rely on
pub async fn check_health(config: &Config, store: &StateStore) -> Result<()> {
    println!("{}", "Health Check".blue().bold());
    println!("   Project root: {}", config.root.display().to_string().bright_black());
    println!();

    let mut all_good = true;

    println!("{}", "Role contexts:".blue());
    let builder = PromptBuilder::new(config);
    for role in Role::ALL {
        let path = builder.context_path(role);
        if path.is_file() {
            println!("   {} {}", "✅".green(), role.context_file());
        } else {
            println!("   {} {} missing ({})", "❌".red(), role.context_file(), path.display());
            all_good = false;
        }
    }

    println!("{}", "Phase references:".blue());
    for phase in [SkillPhase::Engineering, SkillPhase::Cognitive] {
        let path = config.references_dir().join(phase.reference_file());
        if path.is_file() {
            println!("   {} {}", "✅".green(), phase.reference_file());
        } else {
            println!(
                "   {} {} missing (prompts will embed no reference)",
                "⚠️".yellow(),
                phase.reference_file()
            );
        }
    }

    println!("{}", "Skills:".blue());
    let (registry, report) = SkillRegistry::load(config).await;
    let skills = registry.list_skills();
    if skills.is_empty() {
        println!("   {} No skills found in {}", "⚠️".yellow(), config.skills_dir().display());
    } else {
        println!("   {} {} skills loaded", "✅".green(), skills.len());
    }
    for skill_name in &config.skills.engineering {
        if !registry.has_skill(skill_name) {
            println!("   {} engineering skill '{}' has no SKILL.md", "⚠️".yellow(), skill_name);
        }
    }
    for error in &report.errors {
        println!("   {} {}: {}", "❌".red(), error.path.display(), error.message);
    }

    println!("{}", "Repositories:".blue());
    let repos_dir = config.repos_dir();
    if repos_dir.is_dir() {
        println!("   {} {}", "✅".green(), repos_dir.display());
    } else {
        println!("   {} {} does not exist yet", "⚠️".yellow(), repos_dir.display());
    }

    println!("{}", "Reports:".blue());
    let reports_dir = config.reports_dir();
    if reports_dir.is_dir() {
        println!("   {} {}", "✅".green(), reports_dir.display());
    } else {
        println!("   {} {} will be created by the agents", "ℹ️".blue(), reports_dir.display());
    }

    println!("{}", "State:".blue());
    println!("   Directory: {}", store.state_dir().display().to_string().bright_black());
    let manifest = store.load_manifest().await?;
    if manifest.is_empty() {
        println!("   {} No frameworks tracked", "ℹ️".blue());
    } else {
        println!(
            "   {} {} frameworks tracked, {} completed",
            "✅".green(),
            manifest.len(),
            manifest.count(&Status::Completed)
        );
    }

    println!();
    if all_good {
        println!("{}", "Everything needed to build prompts is in place.".green().bold());
        Ok(())
    } else {
        Err(anyhow!("required role context files are missing"))
    }
}
