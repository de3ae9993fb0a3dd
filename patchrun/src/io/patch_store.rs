//! Patch document lookup across the primary and fallback directories.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jsonschema::{Draft, Validator};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::patch_name::PatchName;
use crate::core::shell_union::post_mutation_shell;
use crate::error::OrchestratorError;

const PATCH_SCHEMA: &str = include_str!("../../schemas/patch_document.schema.json");

/// A loaded patch. `document` keeps every field; only `shell` is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchDocument {
    pub name: String,
    pub path: PathBuf,
    pub document: Value,
    /// `postMutationBuild.shell`, in declared order, not yet rewritten.
    pub shell: Vec<String>,
}

impl PatchDocument {
    /// Top-level metadata passed through untouched (e.g. `blockId`, `summaryFile`).
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }
}

/// Resolves patch names to documents. Primary always wins over fallback.
pub struct PatchLoader {
    primary: PathBuf,
    fallback: PathBuf,
    schema: Validator,
}

impl PatchLoader {
    pub fn new(primary: impl Into<PathBuf>, fallback: impl Into<PathBuf>) -> Result<Self> {
        let schema_json: Value =
            serde_json::from_str(PATCH_SCHEMA).context("parse patch document schema")?;
        let schema = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema_json)
            .context("compile json schema")?;
        Ok(Self {
            primary: primary.into(),
            fallback: fallback.into(),
            schema,
        })
    }

    fn dirs(&self) -> [&Path; 2] {
        [&self.primary, &self.fallback]
    }

    /// Find the file for `name`: `name`, then `name.json`, primary before fallback.
    pub fn locate(&self, name: &str) -> Result<PathBuf, OrchestratorError> {
        let mut candidates = vec![name.to_string()];
        if !name.ends_with(".json") {
            candidates.push(format!("{name}.json"));
        }
        let mut searched = Vec::new();
        for dir in self.dirs() {
            for candidate in &candidates {
                let path = dir.join(candidate);
                if path.is_file() {
                    return Ok(path);
                }
                searched.push(path);
            }
        }
        Err(OrchestratorError::PatchNotFound {
            name: name.to_string(),
            searched,
        })
    }

    /// Load and shape-check a patch document.
    #[instrument(skip(self))]
    pub fn load(&self, name: &str) -> Result<PatchDocument> {
        let path = self.locate(name)?;
        debug!(path = %path.display(), "patch located");
        let raw = fs::read_to_string(&path).map_err(|err| OrchestratorError::Unreadable {
            path: path.clone(),
            message: err.to_string(),
        })?;
        let document: Value =
            serde_json::from_str(&raw).map_err(|err| OrchestratorError::Parse {
                path: path.clone(),
                message: err.to_string(),
            })?;
        let violations: Vec<String> = self
            .schema
            .iter_errors(&document)
            .map(|err| err.to_string())
            .collect();
        if !violations.is_empty() {
            return Err(OrchestratorError::Parse {
                path,
                message: format!("schema validation failed: {}", violations.join("; ")),
            }
            .into());
        }
        let shell = post_mutation_shell(&document);
        debug!(steps = shell.len(), "patch loaded");
        Ok(PatchDocument {
            name: name.to_string(),
            path,
            document,
            shell,
        })
    }

    /// Every conventionally named patch file, sorted by execution order.
    ///
    /// A file in the primary directory shadows a fallback file of the same name.
    /// Missing directories are skipped.
    pub fn scan(&self) -> Result<Vec<PatchName>> {
        let mut found: BTreeMap<String, PatchName> = BTreeMap::new();
        for dir in self.dirs() {
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "patch directory missing, skipping");
                continue;
            }
            for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
                let entry = entry.context("read entry")?;
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if !file_name.ends_with(".json") || found.contains_key(&file_name) {
                    continue;
                }
                if let Some(parsed) = PatchName::parse(&file_name) {
                    found.insert(file_name, parsed);
                }
            }
        }
        let mut names: Vec<PatchName> = found.into_values().collect();
        names.sort();
        Ok(names)
    }
}
