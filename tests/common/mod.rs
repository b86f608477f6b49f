#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use assert_cmd::Command;
use tempfile::TempDir;

pub const REFERENCES: &str = ".claude/skills/architectural-forensics/references";

/// Scratch project laid out the way the forensics toolkit expects.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let refs = dir.path().join(REFERENCES);
        fs::create_dir_all(&refs)?;
        for (file, title) in [
            ("orchestrator-agent.md", "# Orchestrator Agent"),
            ("framework-agent.md", "# Framework Agent"),
            ("skill-agent.md", "# Skill Agent"),
            ("synthesis-agent.md", "# Synthesis Agent"),
            ("phase1-engineering.md", "# Phase 1 Engineering"),
            ("phase2-cognitive.md", "# Phase 2 Cognitive"),
        ] {
            fs::write(refs.join(file), title)?;
        }
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_repo(&self, name: &str) -> Result<PathBuf> {
        let repo = self.path().join("repos").join(name);
        fs::create_dir_all(&repo)?;
        Ok(repo)
    }

    pub fn add_skill(&self, name: &str, contents: &str) -> Result<()> {
        let dir = self.path().join(".claude/skills").join(name);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("SKILL.md"), contents)?;
        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path().join("forensics-output/.state/manifest.json")
    }

    pub fn cmd(&self) -> Result<Command> {
        let mut cmd = Command::cargo_bin("forensics")?;
        cmd.current_dir(self.path())
            .env("NO_COLOR", "1")
            .env_remove("FORENSICS_ROOT")
            .env_remove("FORENSICS_REPOS_DIR")
            .env_remove("FORENSICS_OUTPUT_DIR")
            .env_remove("FORENSICS_REPORTS_DIR")
            .env_remove("RUST_LOG")
            // keep a user-level config out of the picture
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".xdg"));
        Ok(cmd)
    }

    pub fn stdout(&self, args: &[&str]) -> Result<String> {
        let output = self.cmd()?.args(args).assert().success().get_output().stdout.clone();
        Ok(String::from_utf8(output)?)
    }
}
