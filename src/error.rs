use std::path::PathBuf;

use thiserror::Error;

pub type ForensicsResult<T, E = ForensicsError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum ForensicsError {
    #[error("I/O error while accessing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse YAML in {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("context file not found: {0:?}")]
    MissingContext(PathBuf),

    #[error("{0:?} does not exist")]
    MissingReposDir(PathBuf),

    #[error("framework '{0}' not found in state")]
    UnknownFramework(String),

    #[error("invalid {kind} name '{name}'")]
    InvalidName { kind: &'static str, name: String },

    #[error("template references unknown placeholder `{{{{{0}}}}}`")]
    UnknownPlaceholder(String),

    #[error("unterminated placeholder in template")]
    UnterminatedPlaceholder,
}

impl ForensicsError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    pub fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_name(kind: &'static str, name: impl Into<String>) -> Self {
        Self::InvalidName {
            kind,
            name: name.into(),
        }
    }
}
