use crate::error::{ForensicsError, ForensicsResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// File name of a skill definition inside its skill directory.
pub const SKILL_FILE: &str = "SKILL.md";

/// Parsed skill definition (`<skills_dir>/<name>/SKILL.md`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillSpec {
    pub name: String,
    pub description: Option<String>,
    pub source_path: PathBuf,
    pub phase: SkillPhase,
}

/// Analysis phase a skill belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillPhase {
    Engineering,
    Cognitive,
}

impl SkillPhase {
    pub fn number(self) -> u8 {
        match self {
            SkillPhase::Engineering => 1,
            SkillPhase::Cognitive => 2,
        }
    }

    /// File name of the phase reference document.
    pub fn reference_file(self) -> &'static str {
        match self {
            SkillPhase::Engineering => "phase1-engineering.md",
            SkillPhase::Cognitive => "phase2-cognitive.md",
        }
    }
}

impl std::fmt::Display for SkillPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkillPhase::Engineering => write!(f, "engineering"),
            SkillPhase::Cognitive => write!(f, "cognitive"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawFrontMatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// A skill loaded from disk, plus anything odd noticed while parsing it.
#[derive(Debug, Clone)]
pub struct ParsedSkill {
    pub spec: SkillSpec,
    pub warnings: Vec<String>,
}

/// Validate a skill name; it becomes a directory component.
pub fn validate_skill_name(name: &str) -> ForensicsResult<()> {
    static NAME: OnceLock<Regex> = OnceLock::new();
    let re = NAME.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("skill name regex is valid")
    });
    if re.is_match(name) {
        Ok(())
    } else {
        Err(ForensicsError::invalid_name("skill", name))
    }
}

impl SkillSpec {
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Parse a SKILL.md document.
    ///
    /// `dir_name` is the name of the directory holding the file; it is the
    /// lookup name of the skill whatever the front matter says.
    pub fn parse_document(
        contents: &str,
        dir_name: &str,
        source_path: PathBuf,
        phase: SkillPhase,
    ) -> ForensicsResult<ParsedSkill> {
        let mut warnings = Vec::new();
        let front_matter = match split_front_matter(contents) {
            Some(raw) if raw.trim().is_empty() => RawFrontMatter::default(),
            Some(raw) => {
                serde_yaml::from_str(raw).map_err(|e| ForensicsError::yaml(&source_path, e))?
            }
            None => RawFrontMatter::default(),
        };

        if let Some(declared) = front_matter.name.as_deref() {
            if declared != dir_name {
                warnings.push(format!(
                    "front matter names the skill '{declared}' but its directory is '{dir_name}'"
                ));
            }
        }

        let description = front_matter
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(ParsedSkill {
            spec: SkillSpec {
                name: dir_name.to_string(),
                description,
                source_path,
                phase,
            },
            warnings,
        })
    }

    /// Load `<skills_dir>/<name>/SKILL.md`.
    pub async fn load(
        skills_dir: &Path,
        name: &str,
        phase: SkillPhase,
    ) -> ForensicsResult<ParsedSkill> {
        validate_skill_name(name)?;
        let path = skill_path(skills_dir, name);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ForensicsError::io(&path, e))?;
        Self::parse_document(&contents, name, path, phase)
    }
}

/// Location of the SKILL.md for `name`.
pub fn skill_path(skills_dir: &Path, name: &str) -> PathBuf {
    skills_dir.join(name).join(SKILL_FILE)
}

/// The `---`-delimited front matter of a document. `None` when the
/// document has no (closed) front matter block.
fn split_front_matter(contents: &str) -> Option<&str> {
    let trimmed = contents.trim_start_matches('\u{feff}');
    let after = trimmed
        .strip_prefix("---\r\n")
        .or_else(|| trimmed.strip_prefix("---\n"))?;

    let mut offset = 0;
    for line in after.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(&after[..offset]);
        }
        offset += line.len();
    }
    None
}
