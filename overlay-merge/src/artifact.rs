//! The reviewable base+overlay wrapper artifact.
//!
//! Execution semantics stay those of the base patch: the artifact only carries both
//! documents side by side plus a best-effort union of their shell steps.

use std::path::Path;

use patchrun::core::shell_union::{post_mutation_shell, union_preserving_order};
use serde::Serialize;
use serde_json::Value;

pub const FORMAT_VERSION: u32 = 1;
pub const MERGED_TYPE: &str = "base+overlay-wrapper";

/// Raw text of one side plus its parse result.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub raw: String,
    pub parsed: Result<Value, String>,
}

impl SourceText {
    pub fn parse(raw: String) -> Self {
        let parsed = serde_json::from_str(&raw).map_err(|err| err.to_string());
        Self { raw, parsed }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MergedArtifact {
    pub merged_format_version: u32,
    pub merged_type: String,
    pub hardened: bool,
    pub source: SourcePaths,
    pub parse: ParseReport,
    pub base_raw: String,
    pub overlay_raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_mutation_build_merged: Option<MergedBuild>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourcePaths {
    pub base_path: String,
    pub overlay_path: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ParseReport {
    pub base: ParseStatus,
    pub overlay: ParseStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ParseStatus {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParseStatus {
    fn of(source: &SourceText) -> Self {
        Self {
            ok: source.parsed.is_ok(),
            error: source.parsed.as_ref().err().cloned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MergedBuild {
    pub shell: Vec<String>,
}

impl MergedArtifact {
    /// Wrap both sides. The merged shell list (overlay steps first) is present when at
    /// least one side parsed.
    pub fn build(
        base_path: &Path,
        overlay_path: &Path,
        base: SourceText,
        overlay: SourceText,
    ) -> Self {
        let parse = ParseReport {
            base: ParseStatus::of(&base),
            overlay: ParseStatus::of(&overlay),
        };
        let base_doc = base.parsed.ok();
        let overlay_doc = overlay.parsed.ok();
        let post_mutation_build_merged = (base_doc.is_some() || overlay_doc.is_some()).then(|| {
            let shell_of = |doc: &Option<Value>| doc.as_ref().map(post_mutation_shell).unwrap_or_default();
            MergedBuild {
                shell: union_preserving_order(&shell_of(&overlay_doc), &shell_of(&base_doc)),
            }
        });

        Self {
            merged_format_version: FORMAT_VERSION,
            merged_type: MERGED_TYPE.to_string(),
            hardened: true,
            source: SourcePaths {
                base_path: base_path.display().to_string(),
                overlay_path: overlay_path.display().to_string(),
            },
            parse,
            base_raw: base.raw,
            overlay_raw: overlay.raw,
            base: base_doc,
            overlay: overlay_doc,
            post_mutation_build_merged,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(steps: &[&str]) -> String {
        json!({ "blockId": "b", "postMutationBuild": { "shell": steps } }).to_string()
    }

    fn build(base: String, overlay: String) -> MergedArtifact {
        MergedArtifact::build(
            Path::new("/p/base.json"),
            Path::new("/p/base_HARDENED.overlay.json"),
            SourceText::parse(base),
            SourceText::parse(overlay),
        )
    }

    #[test]
    fn overlay_steps_come_first_and_duplicates_drop() {
        let artifact = build(doc(&["tsc", "lint", "test"]), doc(&["guard", "lint"]));
        assert_eq!(
            artifact.post_mutation_build_merged,
            Some(MergedBuild {
                shell: vec![
                    "guard".to_string(),
                    "lint".to_string(),
                    "tsc".to_string(),
                    "test".to_string(),
                ],
            })
        );
        assert!(artifact.parse.base.ok && artifact.parse.overlay.ok);
    }

    #[test]
    fn unparsable_side_is_reported_and_kept_raw() {
        let artifact = build(doc(&["tsc"]), "{broken".to_string());
        assert!(!artifact.parse.overlay.ok);
        assert!(artifact.parse.overlay.error.is_some());
        assert_eq!(artifact.overlay, None);
        assert_eq!(artifact.overlay_raw, "{broken");
        assert_eq!(
            artifact.post_mutation_build_merged.map(|merged| merged.shell),
            Some(vec!["tsc".to_string()])
        );
    }

    #[test]
    fn nothing_parsed_means_no_merged_build() {
        let artifact = build("nope".to_string(), "also nope".to_string());
        assert_eq!(artifact.post_mutation_build_merged, None);
    }

    #[test]
    fn serializes_wrapper_field_names() {
        let value = serde_json::to_value(build(doc(&["a"]), doc(&["b"]))).expect("json");
        assert_eq!(value["mergedFormatVersion"], json!(1));
        assert_eq!(value["mergedType"], json!("base+overlay-wrapper"));
        assert_eq!(value["hardened"], json!(true));
        assert_eq!(value["source"]["basePath"], json!("/p/base.json"));
        assert_eq!(value["parse"]["base"], json!({ "ok": true }));
        assert_eq!(value["postMutationBuildMerged"]["shell"], json!(["b", "a"]));
        assert!(value["baseRaw"].is_string());
    }
}
