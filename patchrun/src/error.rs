//! Typed load/parse failures.
//!
//! These travel inside `anyhow::Error` so call sites keep their `.context(...)`
//! chains. Validation downcasts them to tell an unloadable patch apart from a fatal
//! plan error; the binary maps every error to exit code 1.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The execution plan is a required artifact and is never inferred.
    #[error("missing plan JSON: {}", .path.display())]
    PlanNotFound { path: PathBuf },

    #[error("patch not found: {name} (searched {})", render_paths(.searched))]
    PatchNotFound { name: String, searched: Vec<PathBuf> },

    #[error("unreadable file {}: {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("parse error in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid plan {}: {message}", .path.display())]
    InvalidPlan { path: PathBuf, message: String },

    /// `resume` found an `inProgress` patch that the current plan does not list.
    #[error("cannot resume: in-progress patch '{name}' is not in the plan")]
    ResumeTargetMissing { name: String },
}

impl OrchestratorError {
    /// True for failures that mean "the patch could not be loaded" (as opposed to a
    /// broken plan or state).
    pub fn is_patch_load_failure(&self) -> bool {
        matches!(
            self,
            Self::PatchNotFound { .. } | Self::Unreadable { .. } | Self::Parse { .. }
        )
    }
}

fn render_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
