//! Test-only helpers: a temporary workspace laid out like a real project and a
//! scripted step runner.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tempfile::TempDir;

use crate::core::state::ExecutionState;
use crate::core::step::Step;
use crate::io::config::{OrchestratorConfig, write_config};
use crate::io::process::{StepContext, StepOutcome, StepRunner};
use crate::io::state_store::StateStore;

/// Which patch directory a fixture is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchDir {
    Primary,
    Fallback,
}

/// Temporary project root with the default `.patchrun/` layout.
pub struct TestWorkspace {
    temp: TempDir,
    config: OrchestratorConfig,
}

impl TestWorkspace {
    /// Default config except steps use `sh -c`, so fixtures do not need bash.
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let mut config = OrchestratorConfig::default();
        config.exec.shell = vec!["sh".to_string(), "-c".to_string()];
        Ok(Self { temp, config })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut OrchestratorConfig {
        &mut self.config
    }

    fn path(&self, relative: &Path) -> PathBuf {
        self.config.resolve(self.root(), relative)
    }

    /// Persist the current config to `.patchrun/config.toml`.
    pub fn write_config(&self) -> Result<PathBuf> {
        let path = self.root().join(crate::io::config::DEFAULT_CONFIG_PATH);
        write_config(&path, &self.config)?;
        Ok(path)
    }

    pub fn write_plan(&self, names: &[&str]) -> Result<PathBuf> {
        let path = self.path(&self.config.paths.plan);
        write_file(&path, &json!({ "executeInOrder": names }).to_string())?;
        Ok(path)
    }

    /// Write a patch document with the given `postMutationBuild.shell` steps.
    pub fn write_patch(&self, dir: PatchDir, name: &str, steps: &[&str]) -> Result<PathBuf> {
        let document = json!({
            "blockId": format!("block-{name}"),
            "mutations": [],
            "postMutationBuild": { "shell": steps },
        });
        self.write_raw_patch(dir, name, &document.to_string())
    }

    /// Write arbitrary text as a patch file. `.json` is appended when missing.
    pub fn write_raw_patch(&self, dir: PatchDir, name: &str, contents: &str) -> Result<PathBuf> {
        let dir = match dir {
            PatchDir::Primary => self.path(&self.config.paths.primary_dir),
            PatchDir::Fallback => self.path(&self.config.paths.fallback_dir),
        };
        let file = if name.ends_with(".json") {
            name.to_string()
        } else {
            format!("{name}.json")
        };
        let path = dir.join(file);
        write_file(&path, contents)?;
        Ok(path)
    }

    pub fn state_path(&self) -> PathBuf {
        self.path(&self.config.paths.state)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.path(&self.config.paths.journal)
    }

    pub fn read_state(&self) -> ExecutionState {
        StateStore::new(self.state_path()).read()
    }

    pub fn write_state(&self, state: &ExecutionState) -> Result<()> {
        StateStore::new(self.state_path()).write(state)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

/// Step runner that replays queued exit codes and records every command it saw.
#[derive(Debug, Default)]
pub struct ScriptedStepRunner {
    exit_codes: RefCell<VecDeque<i32>>,
    calls: RefCell<Vec<Step>>,
}

impl ScriptedStepRunner {
    pub fn new(exit_codes: impl IntoIterator<Item = i32>) -> Self {
        Self {
            exit_codes: RefCell::new(exit_codes.into_iter().collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Step> {
        self.calls.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|step| step.command.clone())
            .collect()
    }
}

impl StepRunner for ScriptedStepRunner {
    fn run(&self, step: &Step, _ctx: &StepContext<'_>) -> Result<StepOutcome> {
        self.calls.borrow_mut().push(step.clone());
        let code = self
            .exit_codes
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted runner exhausted at '{}'", step.command))?;
        Ok(StepOutcome::exited(code))
    }
}

/// Environment lookup that sees nothing.
pub fn no_env(_key: &str) -> Option<String> {
    None
}
