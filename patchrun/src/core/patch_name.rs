//! Structured identity parsed from patch file names.
//!
//! `patch-v1.4.211(P1.2.1)_sacred-view-mounts.json` carries a version triple, a
//! `(phase, step, attempt)` position, and a free-form tag.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

static PATCH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^patch-v(\d+)\.(\d+)\.(\d+)\(P(\d+)\.(\d+)\.(\d+)\)(?:_(.*?))?(?:\.json)?$")
        .expect("patch name regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchName {
    /// File name as given (with or without `.json`).
    pub name: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub phase: u32,
    pub step: u32,
    pub attempt: u32,
    pub tag: Option<String>,
}

impl PatchName {
    /// Parse a patch file name. Returns `None` for names outside the convention.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = PATCH_NAME.captures(name)?;
        let num = |idx: usize| caps[idx].parse::<u32>().ok();
        Some(Self {
            name: name.to_string(),
            major: num(1)?,
            minor: num(2)?,
            patch: num(3)?,
            phase: num(4)?,
            step: num(5)?,
            attempt: num(6)?,
            tag: caps
                .get(7)
                .map(|m| m.as_str().to_string())
                .filter(|tag| !tag.is_empty()),
        })
    }

    /// Short identifier used by dependency tables, e.g. `P2.9.8`.
    pub fn id(&self) -> String {
        format!("P{}.{}.{}", self.phase, self.step, self.attempt)
    }

    /// Execution order key: `(phase, step, attempt, patch number)`.
    pub fn order_key(&self) -> (u32, u32, u32, u32) {
        (self.phase, self.step, self.attempt, self.patch)
    }
}

impl Ord for PatchName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key()
            .cmp(&other.order_key())
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for PatchName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Strip a trailing `.json` from a patch file name.
pub fn stem(name: &str) -> &str {
    name.strip_suffix(".json").unwrap_or(name)
}

/// True if a dependency-table key refers to the patch `name`.
///
/// A key matches the exact name, the name without `.json`, or the parsed short id.
/// Substring matching is deliberately not used: `P1.2.1` must not match `P1.2.10`.
pub fn key_matches(key: &str, name: &str) -> bool {
    if key == name || key == stem(name) {
        return true;
    }
    PatchName::parse(name).is_some_and(|parsed| parsed.id() == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_fields() {
        let parsed = PatchName::parse("patch-v1.4.211(P1.2.1)_sacred-view-mounts").expect("parse");
        assert_eq!(parsed.major, 1);
        assert_eq!(parsed.minor, 4);
        assert_eq!(parsed.patch, 211);
        assert_eq!((parsed.phase, parsed.step, parsed.attempt), (1, 2, 1));
        assert_eq!(parsed.tag.as_deref(), Some("sacred-view-mounts"));
        assert_eq!(parsed.id(), "P1.2.1");
    }

    #[test]
    fn parses_json_suffix_and_zero_padded_attempt() {
        let parsed =
            PatchName::parse("patch-v1.6.552(P6.6.000)_navigator-route-consolidation.json")
                .expect("parse");
        assert_eq!(parsed.order_key(), (6, 6, 0, 552));
        assert_eq!(parsed.tag.as_deref(), Some("navigator-route-consolidation"));
        assert_eq!(parsed.id(), "P6.6.0");
    }

    #[test]
    fn rejects_unconventional_names() {
        assert!(PatchName::parse("P1").is_none());
        assert!(PatchName::parse("patch-v1.2(P1.2.1)_x").is_none());
    }

    #[test]
    fn sorts_by_phase_step_attempt_then_patch_number() {
        let mut names: Vec<PatchName> = [
            "patch-v1.0.9(P2.0.0)_c",
            "patch-v1.0.5(P1.3.0)_b",
            "patch-v1.0.7(P1.2.1)_a2",
            "patch-v1.0.6(P1.2.1)_a1",
            "patch-v1.0.8(P1.2.0)_a0",
        ]
        .iter()
        .filter_map(|name| PatchName::parse(name))
        .collect();
        names.sort();
        let tags: Vec<&str> = names.iter().filter_map(|n| n.tag.as_deref()).collect();
        assert_eq!(tags, vec!["a0", "a1", "a2", "b", "c"]);
    }

    #[test]
    fn key_matching_is_exact() {
        assert!(key_matches("P1.2.1", "patch-v1.0.1(P1.2.1)_x.json"));
        assert!(!key_matches("P1.2.1", "patch-v1.0.1(P1.2.10)_x.json"));
        assert!(key_matches("P1", "P1"));
        assert!(key_matches("P1", "P1.json"));
        assert!(!key_matches("P1", "P10"));
    }
}
