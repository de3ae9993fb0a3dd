//! Sequential, resumable patch execution orchestrator.
//!
//! Reads an execution plan (`.patchrun/plan.json`), applies each patch's declared
//! build steps in order, and checkpoints progress to `.patchrun/state/` so a failed
//! run can be resumed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use patchrun::core::state::StartMode;
use patchrun::exit_codes;
use patchrun::io::config::{DEFAULT_CONFIG_PATH, OrchestratorConfig, load_config};
use patchrun::io::process::ProcessStepRunner;
use patchrun::io::state_store::StateStore;
use patchrun::runner::{RunEvent, RunStop, Runner};
use patchrun::validate::{ValidateSource, validate_patches};

#[derive(Parser)]
#[command(
    name = "patchrun",
    version,
    about = "Sequential, resumable patch execution orchestrator"
)]
struct Cli {
    /// Config file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the plan, run it from the start, or resume after the last checkpoint.
    Run {
        #[arg(long, value_enum, default_value_t = Mode::Plan)]
        mode: Mode,
    },
    /// Check declared patch dependencies against the execution order.
    Validate {
        /// Validate every patch file found in the patch directories instead of the plan.
        #[arg(long)]
        scan: bool,
    },
    /// Print the persisted execution state as JSON.
    Status,
    /// Delete the execution state file so the next resume starts over.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// List the plan without executing anything.
    Plan,
    /// Execute from the first plan entry.
    Run,
    /// Continue from the persisted state.
    Resume,
}

fn main() -> ExitCode {
    patchrun::logging::init();
    match run() {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("{:#}", err);
            exit_code(exit_codes::LOAD_FAILED)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run() -> Result<i32> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            err.print().context("print usage")?;
            return Ok(if err.use_stderr() {
                exit_codes::LOAD_FAILED
            } else {
                exit_codes::OK
            });
        }
    };
    let root = std::env::current_dir().context("resolve working directory")?;
    let config = load_config(&root.join(&cli.config))?;
    match cli.command {
        Command::Run { mode } => cmd_run(&config, &root, mode),
        Command::Validate { scan } => cmd_validate(&config, &root, scan),
        Command::Status => cmd_status(&config, &root),
        Command::Reset => cmd_reset(&config, &root),
    }
}

fn cmd_run(config: &OrchestratorConfig, root: &Path, mode: Mode) -> Result<i32> {
    let runner = Runner::new(
        config,
        root,
        |key| std::env::var(key).ok(),
        ProcessStepRunner::new(config.exec.shell.clone()),
    )?;

    let start = match mode {
        Mode::Plan => {
            let plan = runner.plan()?;
            for line in plan.numbered() {
                println!("{line}");
            }
            return Ok(exit_codes::OK);
        }
        Mode::Run => StartMode::Run,
        Mode::Resume => StartMode::Resume,
    };

    let outcome = runner.execute(start, |event| match event {
        RunEvent::PatchStarted {
            position,
            total,
            name,
        } => println!("\n=== EXEC ({position}/{total}) :: {name} ==="),
        RunEvent::StepStarted { step, .. } => println!("$ {}", step.command),
        RunEvent::PatchCompleted { .. } => {}
    })?;

    match outcome.stop {
        RunStop::Completed => {
            println!("\nAll patches executed.");
            Ok(exit_codes::OK)
        }
        RunStop::StepFailed {
            patch,
            command,
            exit_code,
        } => {
            eprintln!("\nFAILED step in: {patch}");
            eprintln!("  command: {command}");
            match exit_code {
                Some(code) => eprintln!("  exit code: {code}"),
                None => eprintln!("  exit code: none (step could not be started)"),
            }
            eprintln!("Fix the failure, then run `patchrun run --mode resume`.");
            Ok(exit_codes::STEP_FAILED)
        }
    }
}

fn cmd_validate(config: &OrchestratorConfig, root: &Path, scan: bool) -> Result<i32> {
    let source = if scan {
        ValidateSource::Scan
    } else {
        ValidateSource::Plan
    };
    let outcome = validate_patches(config, root, source)?;

    println!("Validating {} patches", outcome.ordered.len());
    for (name, reason) in &outcome.load_failures {
        println!("FAIL {name} (not loadable: {reason})");
    }
    for check in &outcome.report.checks {
        println!("{check}");
    }
    for finding in &outcome.missing_commands {
        println!("{finding}");
    }

    if outcome.passed() {
        println!("All dependencies satisfied.");
        Ok(exit_codes::OK)
    } else {
        println!("Dependency validation failed: {} issue(s).", outcome.issue_count());
        Ok(exit_codes::DEPENDENCY_GAP)
    }
}

fn cmd_status(config: &OrchestratorConfig, root: &Path) -> Result<i32> {
    let store = StateStore::new(config.resolve(root, &config.paths.state));
    let state = store.read();
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(exit_codes::OK)
}

fn cmd_reset(config: &OrchestratorConfig, root: &Path) -> Result<i32> {
    let store = StateStore::new(config.resolve(root, &config.paths.state));
    if store.reset()? {
        println!("Removed {}", store.path().display());
    } else {
        println!("No execution state at {}", store.path().display());
    }
    Ok(exit_codes::OK)
}
