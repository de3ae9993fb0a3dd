//! Merge every configured base/overlay pair into the output directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use patchrun::io::config::OverlayPair;
use tracing::{debug, warn};

use crate::artifact::{MergedArtifact, SourceText};

const MERGED_SUFFIX: &str = "_HARDENED.merged.wrapper.json";

/// What happened to one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    Merged(PathBuf),
    /// One side was missing, unreadable, or empty.
    Skipped { reason: String },
}

/// `<base stem>_HARDENED.merged.wrapper.json` inside `output_dir`.
pub fn merged_path(output_dir: &Path, base: &Path) -> PathBuf {
    let file_name = base
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match file_name.len().checked_sub(".json".len()) {
        Some(cut)
            if file_name.is_char_boundary(cut)
                && file_name[cut..].eq_ignore_ascii_case(".json") =>
        {
            &file_name[..cut]
        }
        _ => file_name.as_str(),
    };
    output_dir.join(format!("{stem}{MERGED_SUFFIX}"))
}

/// Merge one pair. Paths are used as given; resolve them before calling.
pub fn merge_pair(pair: &OverlayPair, output_dir: &Path) -> Result<PairOutcome> {
    let overlay = match read_source(&pair.overlay) {
        Ok(text) => text,
        Err(reason) => {
            return Ok(PairOutcome::Skipped {
                reason: format!("overlay missing or unreadable\n  overlay: {reason}"),
            });
        }
    };
    let base = match read_source(&pair.base) {
        Ok(text) => text,
        Err(reason) => {
            return Ok(PairOutcome::Skipped {
                reason: format!("base missing or unreadable\n  base: {reason}"),
            });
        }
    };

    let artifact = MergedArtifact::build(&pair.base, &pair.overlay, base, overlay);
    let out_path = merged_path(output_dir, &pair.base);
    write_json(&out_path, &artifact)?;
    debug!(path = %out_path.display(), "merged artifact written");
    Ok(PairOutcome::Merged(out_path))
}

fn read_source(path: &Path) -> Result<SourceText, String> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Err(format!("{} (empty file)", path.display())),
        // Invalid UTF-8 is decoded lossily and surfaces as a parse error.
        Ok(bytes) => Ok(SourceText::parse(String::from_utf8_lossy(&bytes).into_owned())),
        Err(err) => {
            warn!(path = %path.display(), err = %err, "failed to read file");
            Err(format!("{} ({err})", path.display()))
        }
    }
}

fn write_json(path: &Path, artifact: &MergedArtifact) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut payload = serde_json::to_string_pretty(artifact).context("serialize artifact")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn pair(dir: &Path, base: &str, overlay: &str) -> OverlayPair {
        OverlayPair {
            base: dir.join(base),
            overlay: dir.join(overlay),
        }
    }

    #[test]
    fn output_name_replaces_json_suffix() {
        let out = Path::new("/out");
        assert_eq!(
            merged_path(out, Path::new("/p/patch-v1.6.552(P6.6.000)_nav.json")),
            PathBuf::from("/out/patch-v1.6.552(P6.6.000)_nav_HARDENED.merged.wrapper.json")
        );
        assert_eq!(
            merged_path(out, Path::new("/p/base.JSON")),
            PathBuf::from("/out/base_HARDENED.merged.wrapper.json")
        );
        assert_eq!(
            merged_path(out, Path::new("/p/base")),
            PathBuf::from("/out/base_HARDENED.merged.wrapper.json")
        );
    }

    #[test]
    fn writes_wrapper_for_readable_pair() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("base.json"),
            json!({ "postMutationBuild": { "shell": ["tsc", "lint"] } }).to_string(),
        )
        .expect("base");
        fs::write(
            temp.path().join("base_HARDENED.overlay.json"),
            json!({ "postMutationBuild": { "shell": ["guard", "tsc"] } }).to_string(),
        )
        .expect("overlay");

        let out_dir = temp.path().join("merged");
        let outcome = merge_pair(
            &pair(temp.path(), "base.json", "base_HARDENED.overlay.json"),
            &out_dir,
        )
        .expect("merge");
        let expected = out_dir.join("base_HARDENED.merged.wrapper.json");
        assert_eq!(outcome, PairOutcome::Merged(expected.clone()));

        let written: Value =
            serde_json::from_str(&fs::read_to_string(&expected).expect("read")).expect("json");
        assert_eq!(
            written["postMutationBuildMerged"]["shell"],
            json!(["guard", "tsc", "lint"])
        );
        assert_eq!(written["hardened"], json!(true));
    }

    #[test]
    fn missing_side_is_skipped_without_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("base.json"), "{}").expect("base");
        let out_dir = temp.path().join("merged");

        let outcome =
            merge_pair(&pair(temp.path(), "base.json", "absent.json"), &out_dir).expect("merge");
        match outcome {
            PairOutcome::Skipped { reason } => assert!(reason.contains("overlay"), "{reason}"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!out_dir.exists());
    }

    #[test]
    fn non_utf8_overlay_is_merged_with_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("base.json"),
            json!({ "postMutationBuild": { "shell": ["tsc"] } }).to_string(),
        )
        .expect("base");
        fs::write(temp.path().join("overlay.json"), b"\xff\xfe{\"a\":1}").expect("overlay");

        let out_dir = temp.path().join("merged");
        let outcome = merge_pair(&pair(temp.path(), "base.json", "overlay.json"), &out_dir)
            .expect("merge");
        let path = match outcome {
            PairOutcome::Merged(path) => path,
            other => panic!("expected a merged artifact, got {other:?}"),
        };

        let written: Value =
            serde_json::from_str(&fs::read_to_string(path).expect("read")).expect("json");
        assert_eq!(written["parse"]["overlay"]["ok"], json!(false));
        assert!(written["parse"]["overlay"]["error"].is_string());
        assert!(written["overlayRaw"].as_str().expect("raw").contains('\u{fffd}'));
        assert_eq!(written["postMutationBuildMerged"]["shell"], json!(["tsc"]));
    }

    #[test]
    fn empty_base_is_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("base.json"), "").expect("base");
        fs::write(temp.path().join("overlay.json"), "{}").expect("overlay");
        let outcome = merge_pair(
            &pair(temp.path(), "base.json", "overlay.json"),
            &temp.path().join("merged"),
        )
        .expect("merge");
        assert!(matches!(outcome, PairOutcome::Skipped { .. }));
    }
}
