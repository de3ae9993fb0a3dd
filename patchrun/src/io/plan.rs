//! Execution plan loading.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OrchestratorError;

/// Ordered patch names for one run (`{"executeInOrder": [...]}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionPlan {
    #[serde(rename = "executeInOrder", default)]
    pub execute_in_order: Vec<String>,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize {
        self.execute_in_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.execute_in_order.is_empty()
    }

    /// `1. name` lines as printed by `run --mode plan`.
    pub fn numbered(&self) -> Vec<String> {
        self.execute_in_order
            .iter()
            .enumerate()
            .map(|(idx, name)| format!("{}. {}", idx + 1, name))
            .collect()
    }
}

/// Load and check the plan. A missing plan is fatal; it is never inferred.
pub fn load_plan(path: &Path) -> Result<ExecutionPlan> {
    debug!(path = %path.display(), "loading plan");
    if !path.exists() {
        return Err(OrchestratorError::PlanNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let contents = fs::read_to_string(path).map_err(|err| OrchestratorError::Unreadable {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let plan: ExecutionPlan =
        serde_json::from_str(&contents).map_err(|err| OrchestratorError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

    let mut seen = HashSet::new();
    if let Some(dup) = plan
        .execute_in_order
        .iter()
        .find(|name| !seen.insert(name.as_str()))
    {
        return Err(OrchestratorError::InvalidPlan {
            path: path.to_path_buf(),
            message: format!("duplicate entry '{dup}'"),
        }
        .into());
    }
    debug!(patches = plan.len(), "plan loaded");
    Ok(plan)
}
