//! Pre-flight dependency checks over an ordered patch list.
//!
//! For every `dependent -> prerequisites` entry the prerequisites must appear
//! strictly before the dependent. Only patches that actually loaded count as
//! present; the caller filters load failures out before calling [`validate`].

use std::collections::BTreeMap;
use std::fmt;

use crate::core::patch_name::key_matches;

/// Static `patch key -> prerequisite keys` table.
///
/// Keys match a patch by exact name, name without `.json`, or short id (`P2.9.8`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl DependencyMap {
    /// Dependencies between known patches of the mobile rebuild phases.
    pub fn builtin() -> Self {
        Self::from_entries([
            // splash mount guard needs the sacred layouts
            ("P0.5.3", vec!["P0.5.2"]),
            // visual overlay debug needs the bottom nav migration
            ("P1.3.5", vec!["P1.3.4"]),
            // test map needs the dual-mount dashboard
            ("P2.9.8", vec!["P2.1.0"]),
            ("P2.9.9", vec!["P2.9.8"]),
        ])
    }

    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(key, prereqs)| (key.into(), prereqs.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// Add entries, replacing existing keys.
    pub fn extend(&mut self, other: &BTreeMap<String, Vec<String>>) {
        for (key, prereqs) in other {
            self.entries.insert(key.clone(), prereqs.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of one dependency relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Satisfied,
    /// Prerequisite not in the prefix. `later` is true when it appears after the
    /// dependent instead.
    Missing { later: bool },
    /// The dependent itself is not among the loaded patches.
    DependentNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCheck {
    pub dependent: String,
    /// `None` for [`CheckStatus::DependentNotFound`].
    pub prerequisite: Option<String>,
    pub status: CheckStatus,
}

impl DependencyCheck {
    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Satisfied
    }
}

impl fmt::Display for DependencyCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prereq = self.prerequisite.as_deref().unwrap_or("-");
        match self.status {
            CheckStatus::Satisfied => write!(f, "PASS {} <- {}", self.dependent, prereq),
            CheckStatus::Missing { later: false } => {
                write!(f, "FAIL {} <- {} (missing)", self.dependent, prereq)
            }
            CheckStatus::Missing { later: true } => write!(
                f,
                "FAIL {} <- {} (scheduled after dependent)",
                self.dependent, prereq
            ),
            CheckStatus::DependentNotFound => {
                write!(f, "FAIL {} (dependent patch not found)", self.dependent)
            }
        }
    }
}

/// Per-relationship findings plus the aggregate outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub checks: Vec<DependencyCheck>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(DependencyCheck::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DependencyCheck> {
        self.checks.iter().filter(|check| !check.passed())
    }
}

/// Check every dependency entry against `ordered` (execution order).
pub fn validate<S: AsRef<str>>(ordered: &[S], deps: &DependencyMap) -> ValidationReport {
    let position = |key: &str| {
        ordered
            .iter()
            .position(|name| key_matches(key, name.as_ref()))
    };

    let mut checks = Vec::new();
    for (dependent, prereqs) in deps.iter() {
        let Some(at) = position(dependent) else {
            checks.push(DependencyCheck {
                dependent: dependent.clone(),
                prerequisite: None,
                status: CheckStatus::DependentNotFound,
            });
            continue;
        };
        let (prefix, rest) = ordered.split_at(at);
        for prereq in prereqs {
            let status = if prefix.iter().any(|name| key_matches(prereq, name.as_ref())) {
                CheckStatus::Satisfied
            } else {
                CheckStatus::Missing {
                    later: rest.iter().any(|name| key_matches(prereq, name.as_ref())),
                }
            };
            checks.push(DependencyCheck {
                dependent: dependent.clone(),
                prerequisite: Some(prereq.clone()),
                status,
            });
        }
    }
    ValidationReport { checks }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(entries: &[(&str, &[&str])]) -> DependencyMap {
        DependencyMap::from_entries(
            entries
                .iter()
                .map(|(key, prereqs)| (*key, prereqs.iter().copied())),
        )
    }

    #[test]
    fn satisfied_when_prerequisite_precedes() {
        let report = validate(&["P1", "P2", "P3"], &deps(&[("P2", &["P1"])]));
        assert!(report.passed());
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.checks[0].to_string(), "PASS P2 <- P1");
    }

    #[test]
    fn missing_when_prerequisite_absent() {
        let report = validate(&["P2", "P3"], &deps(&[("P2", &["P1"])]));
        assert!(!report.passed());
        assert_eq!(report.checks[0].status, CheckStatus::Missing { later: false });
    }

    #[test]
    fn out_of_order_prerequisite_fails() {
        let report = validate(&["P2", "P1"], &deps(&[("P2", &["P1"])]));
        assert_eq!(report.checks[0].status, CheckStatus::Missing { later: true });
        assert!(report.checks[0].to_string().contains("scheduled after"));
    }

    #[test]
    fn dependent_not_found_is_reported() {
        let report = validate(&["P1"], &deps(&[("P9", &["P1"])]));
        assert_eq!(report.checks[0].status, CheckStatus::DependentNotFound);
        assert_eq!(report.checks[0].prerequisite, None);
        assert!(!report.passed());
    }

    #[test]
    fn every_pair_is_reported_in_key_order() {
        let report = validate(
            &["A", "C", "B", "D"],
            &deps(&[("D", &["A", "B", "E"]), ("B", &["C"])]),
        );
        let rendered: Vec<String> = report.checks.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "PASS B <- C",
                "PASS D <- A",
                "PASS D <- B",
                "FAIL D <- E (missing)",
            ]
        );
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn short_ids_match_full_file_names() {
        let ordered = [
            "patch-v1.0.1(P2.1.0)_dashboard.json",
            "patch-v1.0.2(P2.9.8)_test-map.json",
            "patch-v1.0.3(P2.9.9)_ci.json",
        ];
        let map = deps(&[("P2.9.8", &["P2.1.0"]), ("P2.9.9", &["P2.9.8"])]);
        assert!(validate(&ordered, &map).passed());
    }

    #[test]
    fn extend_replaces_existing_keys() {
        let mut map = deps(&[("P2", &["P1"])]);
        let mut extra = BTreeMap::new();
        extra.insert("P2".to_string(), vec!["P0".to_string()]);
        map.extend(&extra);
        let report = validate(&["P0", "P2"], &map);
        assert!(report.passed());
    }

    #[test]
    fn builtin_table_is_not_empty() {
        assert!(!DependencyMap::builtin().is_empty());
    }
}
