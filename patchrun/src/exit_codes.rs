//! Stable exit codes for patchrun CLI commands.

/// Command succeeded, the run completed, or a dry-run plan was printed.
pub const OK: i32 = 0;
/// Fatal load error: missing plan/patch, unreadable file, parse failure, bad config,
/// or invalid command-line arguments.
pub const LOAD_FAILED: i32 = 1;
/// A patch step exited non-zero; state was persisted for `resume`.
pub const STEP_FAILED: i32 = 2;
/// `patchrun validate` found an unsatisfied dependency or an unloadable patch.
pub const DEPENDENCY_GAP: i32 = 3;
