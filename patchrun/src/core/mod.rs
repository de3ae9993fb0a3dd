//! Deterministic, pure logic shared by the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod build_commands;
pub mod deps;
pub mod patch_name;
pub mod rewrite;
pub mod shell_union;
pub mod state;
pub mod step;
