//! Step execution adapter.
//!
//! The [`StepRunner`] trait decouples the run loop from process spawning so tests
//! can script exit codes without touching the system.

use std::path::Path;
use std::process::Command;

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::core::step::{Step, StepKind};

/// Where and with what environment a step runs.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub workdir: &'a Path,
    /// Exported to every step in addition to the inherited environment.
    pub env: &'a [(String, String)],
}

/// Result of one step. A step that could not be spawned has no exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            error: None,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait StepRunner {
    fn run(&self, step: &Step, ctx: &StepContext<'_>) -> Result<StepOutcome>;
}

/// Spawns real child processes with inherited stdio, one at a time.
#[derive(Debug, Clone)]
pub struct ProcessStepRunner {
    shell: Vec<String>,
}

impl ProcessStepRunner {
    /// `shell` is the program plus leading args for shell-mode steps (`bash -lc`).
    pub fn new(shell: Vec<String>) -> Self {
        Self { shell }
    }

    fn command(&self, step: &Step) -> Command {
        match &step.kind {
            StepKind::Direct { env, program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd.envs(env.iter().map(|(key, value)| (key, value)));
                cmd
            }
            StepKind::Shell => {
                let mut cmd = match self.shell.split_first() {
                    Some((program, leading)) => {
                        let mut cmd = Command::new(program);
                        cmd.args(leading);
                        cmd
                    }
                    None => {
                        let mut cmd = Command::new("sh");
                        cmd.arg("-c");
                        cmd
                    }
                };
                cmd.arg(&step.command);
                cmd
            }
        }
    }
}

impl StepRunner for ProcessStepRunner {
    #[instrument(skip_all, fields(mode = %step.mode()))]
    fn run(&self, step: &Step, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let mut cmd = self.command(step);
        // Step-level `NAME=value` assignments were applied first; context env must not
        // override them.
        for (key, value) in ctx.env {
            if !step_assigns(step, key) {
                cmd.env(key, value);
            }
        }
        cmd.current_dir(ctx.workdir);

        debug!(command = %step.command, "spawning step");
        match cmd.status() {
            Ok(status) => {
                debug!(exit_code = ?status.code(), "step finished");
                Ok(StepOutcome {
                    exit_code: status.code(),
                    error: None,
                })
            }
            Err(err) => {
                warn!(command = %step.command, err = %err, "failed to spawn step");
                Ok(StepOutcome {
                    exit_code: None,
                    error: Some(err.to_string()),
                })
            }
        }
    }
}

fn step_assigns(step: &Step, key: &str) -> bool {
    match &step.kind {
        StepKind::Direct { env, .. } => env.iter().any(|(name, _)| name == key),
        StepKind::Shell => false,
    }
}
