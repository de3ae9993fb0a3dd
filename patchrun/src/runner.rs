//! The run loop: plan → load → rewrite → execute → persist.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, info_span, warn};

use crate::core::rewrite::Rewriter;
use crate::core::state::{StartMode, start_index};
use crate::core::step::Step;
use crate::io::config::{OrchestratorConfig, step_env};
use crate::io::journal::{StepJournal, StepRecord};
use crate::io::patch_store::{PatchDocument, PatchLoader};
use crate::io::plan::{ExecutionPlan, load_plan};
use crate::io::process::{StepContext, StepRunner};
use crate::io::state_store::{StateStore, timestamp};

/// Why [`Runner::execute`] stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// Every remaining plan entry completed.
    Completed,
    /// A step exited non-zero (or could not be spawned). State names the failure.
    StepFailed {
        patch: String,
        command: String,
        exit_code: Option<i32>,
    },
}

/// Summary of an `execute` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Plan index the run started at (0-based).
    pub start_index: usize,
    /// Patches completed during this invocation.
    pub completed: Vec<String>,
    pub stop: RunStop,
}

/// Progress notifications for the caller (the CLI prints banners from these).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent<'a> {
    PatchStarted {
        /// 1-based position in the plan.
        position: usize,
        total: usize,
        name: &'a str,
    },
    StepStarted {
        patch: &'a str,
        /// 1-based position within the patch.
        position: usize,
        total: usize,
        step: &'a Step,
    },
    PatchCompleted {
        name: &'a str,
    },
}

/// Sequential patch orchestrator. All paths come from configuration.
pub struct Runner<R: StepRunner> {
    plan_path: PathBuf,
    loader: PatchLoader,
    rewriter: Rewriter,
    state: StateStore,
    journal: StepJournal,
    workdir: PathBuf,
    step_env: Vec<(String, String)>,
    step_runner: R,
}

impl<R: StepRunner> Runner<R> {
    /// `env` supplies rewrite overrides (see [`OrchestratorConfig::rewrite_settings`]).
    pub fn new<F>(config: &OrchestratorConfig, root: &Path, env: F, step_runner: R) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        config.validate()?;
        let paths = &config.paths;
        let settings = config.rewrite_settings(root, env);
        Ok(Self {
            plan_path: config.resolve(root, &paths.plan),
            loader: PatchLoader::new(
                config.resolve(root, &paths.primary_dir),
                config.resolve(root, &paths.fallback_dir),
            )?,
            rewriter: Rewriter::new(&settings)?,
            state: StateStore::new(config.resolve(root, &paths.state)),
            journal: StepJournal::new(config.resolve(root, &paths.journal)),
            workdir: config.project_dir(root),
            step_env: step_env(&settings),
            step_runner,
        })
    }

    pub fn step_runner(&self) -> &R {
        &self.step_runner
    }

    /// Load the plan only. Reads no state and spawns nothing.
    pub fn plan(&self) -> Result<ExecutionPlan> {
        load_plan(&self.plan_path)
    }

    /// Rewrite and classify a patch's declared steps.
    pub fn prepare(&self, patch: &PatchDocument) -> Vec<Step> {
        patch
            .shell
            .iter()
            .map(|raw| {
                let (command, applied) = self.rewriter.rewrite_traced(raw);
                if !applied.is_empty() {
                    debug!(original = %raw, rewritten = %command, rules = ?applied, "command rewritten");
                }
                Step::classify(&command)
            })
            .collect()
    }

    /// Run (or resume) the plan until it completes or a step fails.
    ///
    /// Load, parse, and persistence failures are returned as errors; a failing step is
    /// a normal [`RunStop::StepFailed`] outcome.
    pub fn execute<F>(&self, mode: StartMode, mut on_event: F) -> Result<RunOutcome>
    where
        F: FnMut(RunEvent<'_>),
    {
        let plan = self.plan()?;
        let mut state = self.state.read();
        let start = start_index(&plan.execute_in_order, &state, mode)?;
        let total = plan.len();
        info!(?mode, start, total, "starting run");

        let mut completed = Vec::new();
        for (idx, name) in plan.execute_in_order.iter().enumerate().skip(start) {
            let _span = info_span!("patch", name = %name).entered();
            let patch = self
                .loader
                .load(name)
                .with_context(|| format!("load patch {name}"))?;
            let steps = self.prepare(&patch);

            on_event(RunEvent::PatchStarted {
                position: idx + 1,
                total,
                name,
            });
            state.begin(name, timestamp());
            self.state.write(&state)?;

            if let Some(failure) = self.run_steps(name, &steps, &mut on_event)? {
                state.fail(&failure.command, timestamp());
                self.state.write(&state)?;
                warn!(command = %failure.command, exit_code = ?failure.exit_code, "step failed, stopping");
                return Ok(RunOutcome {
                    start_index: start,
                    completed,
                    stop: RunStop::StepFailed {
                        patch: name.clone(),
                        command: failure.command,
                        exit_code: failure.exit_code,
                    },
                });
            }

            state.complete(name, timestamp());
            self.state.write(&state)?;
            completed.push(name.clone());
            on_event(RunEvent::PatchCompleted { name });
        }

        info!(executed = completed.len(), "plan complete");
        Ok(RunOutcome {
            start_index: start,
            completed,
            stop: RunStop::Completed,
        })
    }

    fn run_steps<F>(&self, patch: &str, steps: &[Step], on_event: &mut F) -> Result<Option<Failure>>
    where
        F: FnMut(RunEvent<'_>),
    {
        let ctx = StepContext {
            workdir: &self.workdir,
            env: &self.step_env,
        };
        for (idx, step) in steps.iter().enumerate() {
            on_event(RunEvent::StepStarted {
                patch,
                position: idx + 1,
                total: steps.len(),
                step,
            });
            let outcome = self.step_runner.run(step, &ctx)?;
            let record = StepRecord {
                ts: timestamp(),
                patch: patch.to_string(),
                index: idx + 1,
                command: step.command.clone(),
                mode: step.mode(),
                exit_code: outcome.exit_code,
                success: outcome.success(),
            };
            // Journal errors are logged only; a failing step must still reach state.
            if let Err(err) = self.journal.append(&record) {
                warn!(
                    path = %self.journal.path().display(),
                    err = %format!("{err:#}"),
                    "failed to append step journal"
                );
            }
            if !outcome.success() {
                return Ok(Some(Failure {
                    command: step.command.clone(),
                    exit_code: outcome.exit_code,
                }));
            }
        }
        Ok(None)
    }
}

struct Failure {
    command: String,
    exit_code: Option<i32>,
}
