use crate::config::Config;
use crate::skill::{ParsedSkill, SkillPhase, SkillSpec, SKILL_FILE};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct SkillRegistry {
    skills: BTreeMap<String, SkillSpec>,
    skills_dir: PathBuf,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub warnings: Vec<LoadError>,
    pub errors: Vec<LoadError>,
}

#[derive(Debug)]
pub struct LoadError {
    pub path: PathBuf,
    pub message: String,
}

impl SkillRegistry {
    /// Discover every `<skills_dir>/<name>/SKILL.md` for the given config.
    pub async fn load(config: &Config) -> (Self, LoadReport) {
        let mut registry = Self {
            skills: BTreeMap::new(),
            skills_dir: config.skills_dir(),
        };
        let report = registry.reload(config).await;
        (registry, report)
    }

    /// Rescan the skills directory
    pub async fn reload(&mut self, config: &Config) -> LoadReport {
        self.skills.clear();
        let mut report = LoadReport::default();

        if !self.skills_dir.is_dir() {
            tracing::debug!(dir = %self.skills_dir.display(), "skills directory missing");
            return report;
        }

        for entry in WalkDir::new(&self.skills_dir)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.errors.push(LoadError {
                        path: e
                            .path()
                            .map(Path::to_path_buf)
                            .unwrap_or_else(|| self.skills_dir.clone()),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() || entry.file_name() != SKILL_FILE {
                continue;
            }

            let Some(dir_name) = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .and_then(|n| n.to_str())
            else {
                continue;
            };
            if dir_name.starts_with('.') {
                continue;
            }

            let phase = phase_for(config, dir_name);
            match SkillSpec::load(&self.skills_dir, dir_name, phase).await {
                Ok(ParsedSkill { spec, warnings }) => {
                    for message in warnings {
                        report.warnings.push(LoadError {
                            path: spec.source_path.clone(),
                            message,
                        });
                    }
                    self.skills.insert(spec.name.clone(), spec);
                    report.loaded += 1;
                }
                Err(e) => report.errors.push(LoadError {
                    path: entry.path().to_path_buf(),
                    message: e.to_string(),
                }),
            }
        }

        tracing::debug!(loaded = report.loaded, errors = report.errors.len(), "skills scanned");
        report
    }

    /// Get all loaded skills, sorted by name
    pub fn list_skills(&self) -> Vec<&SkillSpec> {
        self.skills.values().collect()
    }

    pub fn get_skill(&self, name: &str) -> Option<&SkillSpec> {
        self.skills.get(name)
    }

    pub fn has_skill(&self, name: &str) -> bool {
        self.get_skill(name).is_some()
    }

    pub fn skills_dir(&self) -> &Path {
        &self.skills_dir
    }
}

/// Phase a skill is analysed in, per the configured engineering list.
pub fn phase_for(config: &Config, skill: &str) -> SkillPhase {
    if config.is_engineering_skill(skill) {
        SkillPhase::Engineering
    } else {
        SkillPhase::Cognitive
    }
}
