//! Pre-flight dependency validation for `patchrun validate`.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::build_commands::{MissingBuildCommands, check_patch};
use crate::core::deps::{DependencyMap, ValidationReport, validate};
use crate::error::OrchestratorError;
use crate::io::config::OrchestratorConfig;
use crate::io::patch_store::PatchLoader;
use crate::io::plan::load_plan;

/// Where the validated order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateSource {
    /// The execution plan's `executeInOrder`.
    Plan,
    /// Every conventionally named patch file, in patch-name order.
    Scan,
}

/// Validation result: which patches loaded, which did not, the dependency report and
/// any patches lacking required build commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOutcome {
    /// Loaded patches in execution order.
    pub ordered: Vec<String>,
    /// `(name, reason)` for entries that could not be loaded.
    pub load_failures: Vec<(String, String)>,
    pub report: ValidationReport,
    /// Loaded patches missing entries of `[validate] required_commands`.
    pub missing_commands: Vec<MissingBuildCommands>,
}

impl ValidateOutcome {
    pub fn passed(&self) -> bool {
        self.load_failures.is_empty() && self.report.passed() && self.missing_commands.is_empty()
    }

    /// Number of findings counted toward the failure summary.
    pub fn issue_count(&self) -> usize {
        self.load_failures.len() + self.report.failures().count() + self.missing_commands.len()
    }
}

/// Validate dependencies over the configured plan or a directory scan.
///
/// A missing or malformed plan is fatal. Individual patches that fail to load are
/// reported as findings and excluded from the ordered set.
pub fn validate_patches(
    config: &OrchestratorConfig,
    root: &Path,
    source: ValidateSource,
) -> Result<ValidateOutcome> {
    let loader = PatchLoader::new(
        config.resolve(root, &config.paths.primary_dir),
        config.resolve(root, &config.paths.fallback_dir),
    )?;
    let candidates = match source {
        ValidateSource::Plan => {
            load_plan(&config.resolve(root, &config.paths.plan))?.execute_in_order
        }
        ValidateSource::Scan => loader.scan()?.into_iter().map(|name| name.name).collect(),
    };
    debug!(?source, candidates = candidates.len(), "validating dependencies");
    check_candidates(
        &loader,
        &candidates,
        &config.dependency_map(),
        &config.validation.required_commands,
    )
}

fn check_candidates(
    loader: &PatchLoader,
    candidates: &[String],
    deps: &DependencyMap,
    required_commands: &[String],
) -> Result<ValidateOutcome> {
    let mut ordered = Vec::new();
    let mut load_failures = Vec::new();
    let mut missing_commands = Vec::new();
    for name in candidates {
        match loader.load(name) {
            Ok(patch) => {
                if let Some(finding) = check_patch(name, &patch.shell, required_commands) {
                    warn!(patch = %name, missing = ?finding.missing, "patch lacks required build commands");
                    missing_commands.push(finding);
                }
                ordered.push(name.clone());
            }
            Err(err) => match err.downcast_ref::<OrchestratorError>() {
                Some(domain) if domain.is_patch_load_failure() => {
                    warn!(patch = %name, err = %domain, "patch failed to load");
                    load_failures.push((name.clone(), domain.to_string()));
                }
                _ => return Err(err),
            },
        }
    }
    let report = validate(&ordered, deps);
    Ok(ValidateOutcome {
        ordered,
        load_failures,
        report,
        missing_commands,
    })
}
