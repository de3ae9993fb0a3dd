//! I/O helpers for patchrun commands.

pub mod config;
pub mod journal;
pub mod patch_store;
pub mod plan;
pub mod process;
pub mod state_store;
