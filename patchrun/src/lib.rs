//! Sequential, resumable patch execution orchestrator.
//!
//! A run walks an ordered execution plan of named patches. Each patch document
//! declares shell steps that are rewritten into a canonical form, executed one at a
//! time, and checkpointed to a state file so an interrupted or failed run can resume.
//!
//! - **[`core`]**: Pure, deterministic logic (patch names, rewrite rules, step
//!   classification, dependency checks, state transitions). No I/O.
//! - **[`io`]**: Side-effecting operations (config, plan and patch loading, state
//!   persistence, the step journal, process spawning).
//!
//! [`runner`] and [`validate`] coordinate core logic with I/O to implement CLI commands.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod runner;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
