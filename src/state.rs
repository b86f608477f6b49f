//! Analysis bookkeeping under `<output_dir>/.state`.
//!
//! `manifest.json` tracks the status of every framework found in the repos
//! directory; `<framework>.state.json` records which protocol phases a
//! framework has been through. Both files are also edited by hand, so
//! unknown keys and entries that do not parse survive a rewrite. Only a
//! file that is not JSON at all loads as empty.

use crate::config::Config;
use crate::error::{ForensicsError, ForensicsResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

const MANIFEST_FILE: &str = "manifest.json";

/// Status of a framework in the manifest.
///
/// Values written by something other than this crate are kept as
/// `Other` so a hand-edited manifest is never rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
    Failed,
    Other(String),
}

impl Status {
    pub const KNOWN: [Status; 4] = [
        Status::Pending,
        Status::InProgress,
        Status::Completed,
        Status::Failed,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::Other(other) => other.as_str(),
        }
    }

    /// Parse one of the known statuses; used for CLI input.
    pub fn parse_known(value: &str) -> Result<Status, String> {
        match Status::from(value.to_string()) {
            Status::Other(_) => Err(format!(
                "invalid status '{value}'. Must be one of: {}",
                Status::KNOWN
                    .iter()
                    .map(Status::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            known => Ok(known),
        }
    }
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => Status::Pending,
            "in_progress" => Status::InProgress,
            "completed" => Status::Completed,
            "failed" => Status::Failed,
            _ => Status::Other(value),
        }
    }
}

impl From<Status> for String {
    fn from(value: Status) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkEntry {
    pub status: Status,
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FrameworkEntry {
    /// Rebuild an entry from a hand-written value that did not parse,
    /// keeping its unknown keys.
    fn repair(raw: Value, default_path: PathBuf) -> Self {
        let mut extra = match raw {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let path = match extra.remove("path") {
            Some(Value::String(path)) => PathBuf::from(path),
            _ => default_path,
        };
        extra.remove("status");
        extra.remove("updated_at");
        Self {
            status: Status::Pending,
            path,
            updated_at: None,
            extra,
        }
    }
}

/// Contents of `manifest.json`.
///
/// An entry that does not fit [`FrameworkEntry`] lands in `unreadable` and
/// is written back exactly as it was read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawManifest")]
pub struct Manifest {
    pub frameworks: BTreeMap<String, FrameworkEntry>,
    pub unreadable: BTreeMap<String, Value>,
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    frameworks: BTreeMap<String, Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawManifest> for Manifest {
    fn from(raw: RawManifest) -> Self {
        let mut manifest = Manifest {
            extra: raw.extra,
            ..Manifest::default()
        };
        for (name, value) in raw.frameworks {
            match FrameworkEntry::deserialize(&value) {
                Ok(entry) => {
                    manifest.frameworks.insert(name, entry);
                }
                Err(e) => {
                    tracing::warn!(
                        framework = %name,
                        error = %e,
                        "keeping unreadable manifest entry as is"
                    );
                    manifest.unreadable.insert(name, value);
                }
            }
        }
        manifest
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(untagged)]
        enum Entry<'a> {
            Parsed(&'a FrameworkEntry),
            Raw(&'a Value),
        }

        #[derive(Serialize)]
        struct Out<'a> {
            frameworks: BTreeMap<&'a str, Entry<'a>>,
            #[serde(flatten)]
            extra: &'a Map<String, Value>,
        }

        let mut frameworks: BTreeMap<&str, Entry<'_>> = self
            .unreadable
            .iter()
            .map(|(name, raw)| (name.as_str(), Entry::Raw(raw)))
            .collect();
        frameworks.extend(
            self.frameworks
                .iter()
                .map(|(name, entry)| (name.as_str(), Entry::Parsed(entry))),
        );

        Out {
            frameworks,
            extra: &self.extra,
        }
        .serialize(serializer)
    }
}

impl Manifest {
    /// Pending frameworks in manifest order, at most `limit` of them.
    pub fn next_batch(&self, limit: usize) -> Vec<String> {
        self.frameworks
            .iter()
            .filter(|(_, entry)| entry.status == Status::Pending)
            .map(|(name, _)| name.clone())
            .take(limit)
            .collect()
    }

    pub fn count(&self, status: &Status) -> usize {
        self.frameworks
            .values()
            .filter(|entry| &entry.status == status)
            .count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frameworks.contains_key(name) || self.unreadable.contains_key(name)
    }

    /// Every tracked name, readable or not, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .frameworks
            .keys()
            .chain(self.unreadable.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.frameworks.len() + self.unreadable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Protocol phase of a framework analysis, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum Phase {
    Mapping,
    Phase1,
    Phase2,
    Synthesis,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Mapping, Phase::Phase1, Phase::Phase2, Phase::Synthesis];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Mapping => "mapping",
            Phase::Phase1 => "phase1",
            Phase::Phase2 => "phase2",
            Phase::Synthesis => "synthesis",
        }
    }

    pub fn parse(value: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|phase| phase.as_str() == value)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Contents of `<framework>.state.json`.
///
/// Phase entries with an unknown name or a timestamp that does not parse
/// are kept in `unrecognized_phases` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawFrameworkState")]
pub struct FrameworkState {
    pub framework: String,
    pub phases: BTreeMap<Phase, DateTime<Utc>>,
    pub unrecognized_phases: Map<String, Value>,
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
struct RawFrameworkState {
    #[serde(default)]
    framework: String,
    #[serde(default)]
    phases: Map<String, Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawFrameworkState> for FrameworkState {
    fn from(raw: RawFrameworkState) -> Self {
        let mut state = FrameworkState::new(raw.framework);
        state.extra = raw.extra;
        for (key, value) in raw.phases {
            let phase = Phase::parse(&key);
            let at = value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|at| at.with_timezone(&Utc));
            match (phase, at) {
                (Some(phase), Some(at)) => {
                    state.phases.insert(phase, at);
                }
                _ => {
                    tracing::warn!(
                        framework = %state.framework,
                        phase = %key,
                        "keeping unrecognized phase entry as is"
                    );
                    state.unrecognized_phases.insert(key, value);
                }
            }
        }
        state
    }
}

impl Serialize for FrameworkState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut phases = self.unrecognized_phases.clone();
        for (phase, at) in &self.phases {
            phases.insert(
                phase.as_str().to_string(),
                Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            );
        }
        RawFrameworkState {
            framework: self.framework.clone(),
            phases,
            extra: self.extra.clone(),
        }
        .serialize(serializer)
    }
}

impl FrameworkState {
    pub fn new(framework: impl Into<String>) -> Self {
        Self {
            framework: framework.into(),
            phases: BTreeMap::new(),
            unrecognized_phases: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn is_done(&self, phase: Phase) -> bool {
        self.phases.contains_key(&phase)
    }

    /// First phase in protocol order that has not been recorded.
    pub fn next_phase(&self) -> Option<Phase> {
        Phase::ALL.into_iter().find(|p| !self.is_done(*p))
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct InitReport {
    pub tracked: usize,
    pub added: Vec<String>,
    /// Tracked frameworks whose directory is gone from the repos dir.
    pub missing: Vec<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ResetReport {
    pub reset: Vec<String>,
    pub cleaned: Vec<PathBuf>,
}

/// Reject anything that is not a single plain path component.
pub fn validate_framework_name(name: &str) -> ForensicsResult<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.starts_with('.') => Ok(()),
        _ => Err(ForensicsError::invalid_name("framework", name)),
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    state_dir: PathBuf,
    repos_dir: PathBuf,
    /// Repos dir as configured, used for the `path` recorded per framework.
    repos_label: PathBuf,
    frameworks_output_dir: PathBuf,
}

impl StateStore {
    pub fn new(config: &Config) -> Self {
        Self {
            state_dir: config.state_dir(),
            repos_dir: config.repos_dir(),
            repos_label: config.paths.repos_dir.clone(),
            frameworks_output_dir: config.frameworks_output_dir(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.state_dir.join(MANIFEST_FILE)
    }

    pub fn framework_state_path(&self, framework: &str) -> PathBuf {
        self.state_dir.join(format!("{framework}.state.json"))
    }

    /// Load the manifest. Missing or unreadable JSON yields an empty one.
    pub async fn load_manifest(&self) -> ForensicsResult<Manifest> {
        let path = self.manifest_path();
        Ok(read_json(&path).await?.unwrap_or_default())
    }

    pub async fn save_manifest(&self, manifest: &Manifest) -> ForensicsResult<()> {
        write_json(&self.state_dir, &self.manifest_path(), manifest).await
    }

    /// Scan the repos dir and start tracking any new framework as pending.
    pub async fn init(&self) -> ForensicsResult<InitReport> {
        if !self.repos_dir.is_dir() {
            return Err(ForensicsError::MissingReposDir(self.repos_dir.clone()));
        }

        let mut manifest = self.load_manifest().await?;
        let found = self.discover_frameworks().await?;
        let mut report = InitReport::default();

        for name in &found {
            if !manifest.contains(name) {
                manifest.frameworks.insert(
                    name.clone(),
                    FrameworkEntry {
                        status: Status::Pending,
                        path: self.repos_label.join(name),
                        updated_at: Some(Utc::now()),
                        extra: Map::new(),
                    },
                );
                tracing::info!(framework = %name, "tracking new framework");
                report.added.push(name.clone());
            }
        }

        report.missing = manifest
            .names()
            .into_iter()
            .filter(|name| !found.iter().any(|f| f == name))
            .map(str::to_string)
            .collect();
        if !report.missing.is_empty() {
            tracing::debug!(missing = ?report.missing, "tracked frameworks missing from repos");
        }

        report.tracked = manifest.len();
        self.save_manifest(&manifest).await?;
        Ok(report)
    }

    /// Sorted names of the non-hidden subdirectories of the repos dir.
    async fn discover_frameworks(&self) -> ForensicsResult<Vec<String>> {
        let mut found = Vec::new();
        let mut entries = fs::read_dir(&self.repos_dir)
            .await
            .map_err(|e| ForensicsError::io(&self.repos_dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ForensicsError::io(&self.repos_dir, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(
                    path = %entry.path().display(),
                    "skipping non UTF-8 directory name"
                );
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            // follows symlinks, so linked checkouts count
            let is_dir = fs::metadata(entry.path())
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if is_dir {
                found.push(name);
            }
        }

        found.sort();
        Ok(found)
    }

    pub async fn next_batch(&self, limit: usize) -> ForensicsResult<Vec<String>> {
        Ok(self.load_manifest().await?.next_batch(limit))
    }

    pub async fn mark(&self, framework: &str, status: Status) -> ForensicsResult<()> {
        let mut manifest = self.load_manifest().await?;
        if let Some(raw) = manifest.unreadable.remove(framework) {
            tracing::info!(framework, "rebuilding unreadable manifest entry");
            let entry = FrameworkEntry::repair(raw, self.repos_label.join(framework));
            manifest.frameworks.insert(framework.to_string(), entry);
        }
        let entry = manifest
            .frameworks
            .get_mut(framework)
            .ok_or_else(|| ForensicsError::UnknownFramework(framework.to_string()))?;

        tracing::debug!(framework, from = %entry.status, to = %status, "status change");
        entry.status = status;
        entry.updated_at = Some(Utc::now());
        self.save_manifest(&manifest).await
    }

    /// Put every in-progress framework back to pending and delete its
    /// partial skill output.
    pub async fn reset_in_progress(&self) -> ForensicsResult<ResetReport> {
        let mut manifest = self.load_manifest().await?;
        let mut report = ResetReport::default();

        for (name, entry) in manifest.frameworks.iter_mut() {
            if entry.status != Status::InProgress {
                continue;
            }
            entry.status = Status::Pending;
            entry.updated_at = Some(Utc::now());
            report.reset.push(name.clone());

            if validate_framework_name(name).is_err() {
                tracing::warn!(framework = %name, "not cleaning output for unsafe framework name");
                continue;
            }
            let dir = self.frameworks_output_dir.join(name);
            if dir.is_dir() {
                fs::remove_dir_all(&dir)
                    .await
                    .map_err(|e| ForensicsError::io(&dir, e))?;
                report.cleaned.push(dir);
            }
        }

        self.save_manifest(&manifest).await?;
        Ok(report)
    }

    pub async fn framework_state(&self, framework: &str) -> ForensicsResult<FrameworkState> {
        validate_framework_name(framework)?;
        let path = self.framework_state_path(framework);
        let mut state = read_json(&path)
            .await?
            .unwrap_or_else(|| FrameworkState::new(framework));
        state.framework = framework.to_string();
        Ok(state)
    }

    /// Record completion of `phase` for `framework`.
    pub async fn record_phase(
        &self,
        framework: &str,
        phase: Phase,
    ) -> ForensicsResult<FrameworkState> {
        let mut state = self.framework_state(framework).await?;
        state.unrecognized_phases.remove(phase.as_str());
        state.phases.insert(phase, Utc::now());
        write_json(&self.state_dir, &self.framework_state_path(framework), &state).await?;
        Ok(state)
    }
}

/// `Ok(None)` when the file is missing or does not parse.
async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> ForensicsResult<Option<T>> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ForensicsError::io(path, e)),
    };

    match serde_json::from_str(&contents) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable state file");
            Ok(None)
        }
    }
}

async fn write_json<T: Serialize>(dir: &Path, path: &Path, value: &T) -> ForensicsResult<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| ForensicsError::io(dir, e))?;

    let json = serde_json::to_string_pretty(value).map_err(|e| ForensicsError::json(path, e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .await
        .map_err(|e| ForensicsError::io(&tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| ForensicsError::io(path, e))
}
