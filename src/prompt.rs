//! Prompt builders for the forensics agent roles.
//!
//! Every prompt is the role's reference context followed by an assignment
//! rendered from a bundled template. Rendering is a single pass over the
//! template: substituted values are copied verbatim and never rescanned.

use crate::config::Config;
use crate::error::{ForensicsError, ForensicsResult};
use crate::registry::phase_for;
use crate::skill::{skill_path, validate_skill_name};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Command name used in the instructions handed to agents.
pub const BIN: &str = "forensics";

const ORCHESTRATOR_TEMPLATE: &str = include_str!("../templates/orchestrator.md");
const FRAMEWORK_TEMPLATE: &str = include_str!("../templates/framework.md");
const SKILL_TEMPLATE: &str = include_str!("../templates/skill.md");
const SYNTHESIS_TEMPLATE: &str = include_str!("../templates/synthesis.md");

/// Agent role a prompt is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Orchestrator,
    Framework,
    Skill,
    Synthesis,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Orchestrator, Role::Framework, Role::Skill, Role::Synthesis];

    /// Reference document prepended to the role's prompt.
    pub fn context_file(self) -> &'static str {
        match self {
            Role::Orchestrator => "orchestrator-agent.md",
            Role::Framework => "framework-agent.md",
            Role::Skill => "skill-agent.md",
            Role::Synthesis => "synthesis-agent.md",
        }
    }
}

/// Substitute `{{key}}` placeholders in `template`.
pub fn render(template: &str, vars: &[(&str, &str)]) -> ForensicsResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or(ForensicsError::UnterminatedPlaceholder)?;
        let key = after[..end].trim();
        let value = vars
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| ForensicsError::UnknownPlaceholder(key.to_string()))?;
        out.push_str(value);
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Join a role context and its rendered assignment.
pub fn compose(context: &str, assignment: &str) -> String {
    format!("{context}\n\n---\n\n{assignment}")
}

/// Directory names as they should appear in prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLabels {
    pub repos_dir: String,
    pub output_dir: String,
    pub reports_dir: String,
}

impl PathLabels {
    pub fn from_config(config: &Config) -> Self {
        Self {
            repos_dir: label(&config.paths.repos_dir),
            output_dir: label(&config.paths.output_dir),
            reports_dir: label(&config.paths.reports_dir),
        }
    }
}

impl Default for PathLabels {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn label(path: &Path) -> String {
    let shown = path.display().to_string();
    match shown.trim_end_matches('/') {
        "" => shown,
        trimmed => trimmed.to_string(),
    }
}

pub fn orchestrator_prompt(context: &str, labels: &PathLabels) -> ForensicsResult<String> {
    let assignment = render(
        ORCHESTRATOR_TEMPLATE,
        &[
            ("repos_dir", labels.repos_dir.as_str()),
            ("output_dir", labels.output_dir.as_str()),
            ("reports_dir", labels.reports_dir.as_str()),
            ("bin", BIN),
        ],
    )?;
    Ok(compose(context, &assignment))
}

pub fn framework_prompt(
    context: &str,
    labels: &PathLabels,
    framework_name: &str,
    source_path: &str,
    output_dir: &str,
) -> ForensicsResult<String> {
    let assignment = render(
        FRAMEWORK_TEMPLATE,
        &[
            ("framework_name", framework_name),
            ("source_path", source_path),
            ("output_dir", output_dir),
            ("reports_dir", labels.reports_dir.as_str()),
            ("bin", BIN),
        ],
    )?;
    Ok(compose(context, &assignment))
}

/// Inputs of a skill-agent prompt.
#[derive(Debug, Clone)]
pub struct SkillAssignment<'a> {
    pub skill_name: &'a str,
    pub framework_name: &'a str,
    pub codebase_map_path: &'a str,
    pub output_path: &'a str,
}

pub fn skill_prompt(
    context: &str,
    assignment: &SkillAssignment<'_>,
    skill_content: &str,
    phase_reference: &str,
) -> ForensicsResult<String> {
    let rendered = render(
        SKILL_TEMPLATE,
        &[
            ("skill_name", assignment.skill_name),
            ("framework_name", assignment.framework_name),
            ("codebase_map_path", assignment.codebase_map_path),
            ("output_path", assignment.output_path),
            ("skill_content", skill_content),
            ("phase_reference", phase_reference),
        ],
    )?;
    Ok(compose(context, &rendered))
}

pub fn synthesis_prompt(
    context: &str,
    labels: &PathLabels,
    frameworks: &[String],
) -> ForensicsResult<String> {
    let framework_list = frameworks
        .iter()
        .map(|fw| format!("- {fw}"))
        .collect::<Vec<_>>()
        .join("\n");
    let assignment = render(
        SYNTHESIS_TEMPLATE,
        &[
            ("framework_list", framework_list.as_str()),
            ("reports_dir", labels.reports_dir.as_str()),
            ("output_dir", labels.output_dir.as_str()),
        ],
    )?;
    Ok(compose(context, &assignment))
}

/// Loads role contexts and skill material from disk and builds prompts.
#[derive(Debug)]
pub struct PromptBuilder<'a> {
    config: &'a Config,
    labels: PathLabels,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            labels: PathLabels::from_config(config),
        }
    }

    pub fn context_path(&self, role: Role) -> PathBuf {
        self.config.references_dir().join(role.context_file())
    }

    async fn context(&self, role: Role) -> ForensicsResult<String> {
        let path = self.context_path(role);
        tracing::debug!(path = %path.display(), ?role, "reading role context");
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ForensicsError::MissingContext(path))
            }
            Err(e) => Err(ForensicsError::io(path, e)),
        }
    }

    pub async fn orchestrator(&self) -> ForensicsResult<String> {
        orchestrator_prompt(&self.context(Role::Orchestrator).await?, &self.labels)
    }

    pub async fn framework(
        &self,
        framework_name: &str,
        source_path: &str,
        output_dir: &str,
    ) -> ForensicsResult<String> {
        let context = self.context(Role::Framework).await?;
        framework_prompt(&context, &self.labels, framework_name, source_path, output_dir)
    }

    pub async fn skill(&self, assignment: &SkillAssignment<'_>) -> ForensicsResult<String> {
        validate_skill_name(assignment.skill_name)?;
        let context = self.context(Role::Skill).await?;

        let skill_file = skill_path(&self.config.skills_dir(), assignment.skill_name);
        let skill_content = match read_optional(&skill_file).await? {
            Some(text) => text,
            None => {
                tracing::warn!(path = %skill_file.display(), "skill file not found");
                format!("[Skill file not found: {}]", skill_file.display())
            }
        };

        let phase = phase_for(self.config, assignment.skill_name);
        let reference_file = self.config.references_dir().join(phase.reference_file());
        let phase_reference = read_optional(&reference_file).await?.unwrap_or_default();

        skill_prompt(&context, assignment, &skill_content, &phase_reference)
    }

    pub async fn synthesis(&self, frameworks: &[String]) -> ForensicsResult<String> {
        let context = self.context(Role::Synthesis).await?;
        synthesis_prompt(&context, &self.labels, frameworks)
    }
}

async fn read_optional(path: &Path) -> ForensicsResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ForensicsError::io(path, e)),
    }
}
