//! Durable execution state (`.patchrun/state/execution.state.json`).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::core::state::ExecutionState;

/// Current UTC time as RFC 3339 with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Single-writer JSON store for [`ExecutionState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read persisted state. Absent or corrupt files yield a fresh state.
    pub fn read(&self) -> ExecutionState {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no execution state, starting fresh");
                return ExecutionState::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), err = %err, "unreadable execution state, starting fresh");
                return ExecutionState::default();
            }
        };
        match serde_json::from_str::<ExecutionState>(&contents) {
            Ok(state) => {
                debug!(
                    completed = state.completed.len(),
                    in_progress = ?state.in_progress,
                    "execution state loaded"
                );
                state
            }
            Err(err) => {
                warn!(path = %self.path.display(), err = %err, "corrupt execution state, starting fresh");
                ExecutionState::default()
            }
        }
    }

    /// Atomically write state to disk (temp file + rename).
    pub fn write(&self, state: &ExecutionState) -> Result<()> {
        debug!(
            path = %self.path.display(),
            completed = state.completed.len(),
            in_progress = ?state.in_progress,
            failed = state.failed_at.is_some(),
            "writing execution state"
        );
        let mut buf = serde_json::to_string_pretty(state)?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }

    /// Manual reset: remove the state file. Returns whether a file was removed.
    pub fn reset(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(err).with_context(|| format!("remove execution state {}", self.path.display()))
            }
        }
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp execution state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace execution state {}", path.display()))?;
    Ok(())
}
