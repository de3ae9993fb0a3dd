//! Append-only step journal (`.patchrun/state/steps.jsonl`).
//!
//! One JSON object per executed step, recording the exact command and whether it
//! ran directly or through the shell.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::step::StepMode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub ts: String,
    pub patch: String,
    /// 1-indexed position of the step within its patch.
    pub index: usize,
    pub command: String,
    pub mode: StepMode,
    pub exit_code: Option<i32>,
    pub success: bool,
}

#[derive(Debug, Clone)]
pub struct StepJournal {
    path: PathBuf,
}

impl StepJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &StepRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create journal dir {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(record).context("serialize step record")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open journal {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append journal {}", self.path.display()))?;
        Ok(())
    }

    /// All records in append order. A missing journal is empty.
    pub fn records(&self) -> Result<Vec<StepRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read journal {}", self.path.display()))?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(idx, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("parse journal line {}", idx + 1))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(patch: &str, index: usize, success: bool) -> StepRecord {
        StepRecord {
            ts: "2026-01-01T00:00:00.000Z".to_string(),
            patch: patch.to_string(),
            index,
            command: "tsc --noEmit".to_string(),
            mode: StepMode::Direct,
            exit_code: Some(if success { 0 } else { 1 }),
            success,
        }
    }

    #[test]
    fn appends_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let journal = StepJournal::new(temp.path().join("state/steps.jsonl"));
        journal.append(&record("P1", 1, true)).expect("append");
        journal.append(&record("P2", 1, false)).expect("append");

        let records = journal.records().expect("records");
        assert_eq!(records, vec![record("P1", 1, true), record("P2", 1, false)]);
    }

    #[test]
    fn uses_camel_case_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let journal = StepJournal::new(temp.path().join("steps.jsonl"));
        journal.append(&record("P1", 1, true)).expect("append");
        let contents = fs::read_to_string(journal.path()).expect("read");
        assert!(contents.contains("\"exitCode\":0"));
        assert!(contents.contains("\"mode\":\"direct\""));
    }

    #[test]
    fn missing_journal_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let journal = StepJournal::new(temp.path().join("none.jsonl"));
        assert!(journal.records().expect("records").is_empty());
    }
}
