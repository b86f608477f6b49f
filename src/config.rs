use crate::error::{ForensicsError, ForensicsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// File name of the project-local configuration.
pub const PROJECT_CONFIG_FILE: &str = ".forensics.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub skills: SkillsConfig,
    pub output: OutputConfig,

    // Runtime paths
    #[serde(skip)]
    pub root: PathBuf,
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub skills_dir: PathBuf,
    pub references_dir: PathBuf,
    pub repos_dir: PathBuf,
    pub output_dir: PathBuf,
    pub reports_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// Skills analysed in phase 1 (engineering). Every other skill is phase 2.
    pub engineering: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub colors: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            skills_dir: PathBuf::from(".claude/skills"),
            references_dir: PathBuf::from(".claude/skills/architectural-forensics/references"),
            repos_dir: PathBuf::from("repos"),
            output_dir: PathBuf::from("forensics-output"),
            reports_dir: PathBuf::from("reports"),
        }
    }
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            engineering: vec![
                "data-substrate-analysis".to_string(),
                "execution-engine-analysis".to_string(),
                "component-model-analysis".to_string(),
                "resilience-analysis".to_string(),
            ],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { colors: true }
    }
}

impl Config {
    /// Load configuration for the project at `root`.
    ///
    /// An explicit `config_path` must exist. Without one, the project-local
    /// `.forensics.yaml` is tried, then the user-level config, then defaults.
    pub async fn load(root: &Path, config_path: Option<&Path>) -> ForensicsResult<Self> {
        let candidate = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => [Some(Self::project_config_path(root)), Self::user_config_path()]
                .into_iter()
                .flatten()
                .find(|p| p.is_file()),
        };

        let mut config = match candidate {
            Some(path) => {
                let contents = fs::read_to_string(&path)
                    .await
                    .map_err(|e| ForensicsError::io(&path, e))?;
                let mut config: Config = if contents.trim().is_empty() {
                    Config::default()
                } else {
                    serde_yaml::from_str(&contents).map_err(|e| ForensicsError::yaml(&path, e))?
                };
                tracing::debug!(path = %path.display(), "loaded configuration");
                config.source = Some(path);
                config
            }
            None => Config::default(),
        };

        config.root = root.to_path_buf();
        config.merge_env_vars();
        Ok(config)
    }

    /// Path of the project-local configuration file.
    pub fn project_config_path(root: &Path) -> PathBuf {
        root.join(PROJECT_CONFIG_FILE)
    }

    /// Path of the user-level configuration file, if a config dir is known.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("forensics-agents").join("config.yaml"))
    }

    /// Write this configuration as YAML to `path`.
    pub async fn save_to(&self, path: &Path) -> ForensicsResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ForensicsError::io(parent, e))?;
            }
        }
        let yaml = self.to_yaml().map_err(|e| ForensicsError::yaml(path, e))?;
        fs::write(path, yaml)
            .await
            .map_err(|e| ForensicsError::io(path, e))
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    fn merge_env_vars(&mut self) {
        if let Some(dir) = non_empty_env("FORENSICS_REPOS_DIR") {
            self.paths.repos_dir = PathBuf::from(dir);
        }

        if let Some(dir) = non_empty_env("FORENSICS_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }

        if let Some(dir) = non_empty_env("FORENSICS_REPORTS_DIR") {
            self.paths.reports_dir = PathBuf::from(dir);
        }

        if std::env::var_os("NO_COLOR").is_some() {
            self.output.colors = false;
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.resolve(&self.paths.skills_dir)
    }

    pub fn references_dir(&self) -> PathBuf {
        self.resolve(&self.paths.references_dir)
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.resolve(&self.paths.repos_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.paths.output_dir)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.resolve(&self.paths.reports_dir)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.output_dir().join(".state")
    }

    /// Directory holding skill-agent outputs, one subdirectory per framework.
    pub fn frameworks_output_dir(&self) -> PathBuf {
        self.output_dir().join("frameworks")
    }

    /// Whether `skill` belongs to the engineering phase.
    pub fn is_engineering_skill(&self, skill: &str) -> bool {
        self.skills.engineering.iter().any(|s| s == skill)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
