//! Execution state and its transitions.
//!
//! The persisted shape is `{completed, inProgress, failedAt, failedTs, ts}`. All
//! mutation goes through the transition methods so the invariants hold:
//! `completed` stays duplicate-free and append-only, `inProgress` is only set while a
//! patch runs (or after it failed), and `failedAt` names the exact failing command.

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Persisted run bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutionState {
    /// Patches whose every step succeeded, in completion order.
    pub completed: Vec<String>,
    /// Patch currently executing, or the patch that failed last.
    pub in_progress: Option<String>,
    /// Rewritten command that exited non-zero.
    pub failed_at: Option<String>,
    pub failed_ts: Option<String>,
    /// Timestamp of the last successful transition.
    pub ts: Option<String>,
}

impl ExecutionState {
    /// Mark `patch` as started. Clears a previous failure record.
    pub fn begin(&mut self, patch: &str, ts: String) {
        self.in_progress = Some(patch.to_string());
        self.failed_at = None;
        self.failed_ts = None;
        self.ts = Some(ts);
    }

    /// Mark `patch` as fully applied.
    pub fn complete(&mut self, patch: &str, ts: String) {
        if !self.is_completed(patch) {
            self.completed.push(patch.to_string());
        }
        self.in_progress = None;
        self.failed_at = None;
        self.failed_ts = None;
        self.ts = Some(ts);
    }

    /// Record a failing command. `in_progress` keeps pointing at the failed patch.
    pub fn fail(&mut self, command: &str, ts: String) {
        self.failed_at = Some(command.to_string());
        self.failed_ts = Some(ts);
    }

    pub fn is_completed(&self, patch: &str) -> bool {
        self.completed.iter().any(|done| done == patch)
    }
}

/// How the runner picks its first patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Start from the first plan entry.
    Run,
    /// Continue after the last completed patch, or retry the in-progress one.
    Resume,
}

/// Index of the first plan entry to execute.
///
/// `Resume` restarts the in-progress patch from its first step when one is recorded;
/// otherwise it continues at `completed.len()`, clamped to the plan length.
pub fn start_index(
    plan: &[String],
    state: &ExecutionState,
    mode: StartMode,
) -> Result<usize, OrchestratorError> {
    match mode {
        StartMode::Run => Ok(0),
        StartMode::Resume => match &state.in_progress {
            Some(name) => plan.iter().position(|entry| entry == name).ok_or_else(|| {
                OrchestratorError::ResumeTargetMissing { name: name.clone() }
            }),
            None => Ok(state.completed.len().min(plan.len())),
        },
    }
}
