//! Command rewrite pipeline applied to every patch step before execution.
//!
//! Rules run in a fixed order, each consuming the previous rule's output:
//!
//! 1. [`HelperPathRule`]: every spelling of the step helper becomes one absolute
//!    `node <project>/<helper>` invocation.
//! 2. [`SoftModeRule`]: long-running validation steps get a TTL floor, a canonical
//!    wrapper payload, and a soft-mode environment prefix.
//! 3. [`TestRunnerRule`]: test runner invocations get a default config and an
//!    optional smoke path.
//! 4. [`ToolPathRule`]: a validation tool under an ambiguous relative path is pointed
//!    at its canonical location.
//!
//! Rules 2 and 4 match the canonical form produced by rule 1, so the order is part
//! of the contract. Every rule is idempotent and so is the whole pipeline.

use anyhow::{Context, Result};
use regex::{Captures, Regex};

/// Inputs for the rewrite rules. Built from config plus environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteSettings {
    /// Absolute project directory used in canonical invocations.
    pub project_dir: String,
    /// Helper script path relative to the project (`scripts/nb.cjs`).
    pub helper_script: String,
    /// `--label` value that marks the long-running validation step.
    pub soft_label: String,
    pub ttl_floor_secs: u64,
    /// Script name whose inline `bash -lc` payload is replaced by the wrapper.
    pub validation_entrypoint: String,
    /// Wrapper script path relative to the project.
    pub soft_wrapper: String,
    pub soft_env_var: String,
    pub soft_value: String,
    /// Test runner invocation, e.g. `npx jest`.
    pub test_runner: String,
    pub test_config: String,
    pub smoke_path: Option<String>,
    /// Validation tool file name, e.g. `route-assert.cjs`.
    pub tool_script: String,
    /// Relative directories the tool may be referenced from.
    pub tool_dirs: Vec<String>,
    /// Canonical tool path relative to the project.
    pub tool_canonical: String,
}

impl RewriteSettings {
    /// `node <project>/<helper>`.
    pub fn helper_invocation(&self) -> String {
        format!("node {}", self.project_path(&self.helper_script))
    }

    fn project_path(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.project_dir.trim_end_matches('/'),
            relative.trim_start_matches("./")
        )
    }
}

/// A single pure `&str -> String` rewrite.
pub trait RewriteRule {
    fn name(&self) -> &'static str;
    /// Rewrite `command`. Unmatched input is returned unchanged.
    fn apply(&self, command: &str) -> String;
}

/// Ordered rule pipeline.
pub struct Rewriter {
    rules: Vec<Box<dyn RewriteRule>>,
}

impl Rewriter {
    /// Build the standard four-rule pipeline.
    pub fn new(settings: &RewriteSettings) -> Result<Self> {
        Ok(Self::from_rules(vec![
            Box::new(HelperPathRule::new(settings)?),
            Box::new(SoftModeRule::new(settings)?),
            Box::new(TestRunnerRule::new(settings)?),
            Box::new(ToolPathRule::new(settings)?),
        ]))
    }

    pub fn from_rules(rules: Vec<Box<dyn RewriteRule>>) -> Self {
        Self { rules }
    }

    /// Apply every rule in order. Total: never fails.
    pub fn rewrite(&self, command: &str) -> String {
        self.rewrite_traced(command).0
    }

    /// Like [`Rewriter::rewrite`], also returning the names of rules that changed
    /// the command.
    pub fn rewrite_traced(&self, command: &str) -> (String, Vec<&'static str>) {
        let mut current = command.to_string();
        let mut applied = Vec::new();
        for rule in &self.rules {
            let next = rule.apply(&current);
            if next != current {
                applied.push(rule.name());
                current = next;
            }
        }
        (current, applied)
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }
}

/// `\b` only makes sense after a word character.
fn word_end(escaped_tail: &str, raw: &str) -> String {
    if raw.chars().last().is_some_and(|c| c.is_alphanumeric() || c == '_') {
        format!(r"{escaped_tail}\b")
    } else {
        escaped_tail.to_string()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("compile rewrite pattern {pattern}"))
}

/// Rule 1: canonical absolute helper invocation.
pub struct HelperPathRule {
    /// Patterns whose first group is a prefix to keep (leading whitespace or an
    /// embedding `bash -lc '`).
    variants: Vec<Regex>,
    repeated_node: Regex,
    canonical: String,
}

impl HelperPathRule {
    pub fn new(settings: &RewriteSettings) -> Result<Self> {
        let raw = settings.helper_script.trim_start_matches("./");
        let helper = word_end(&regex::escape(raw), raw);
        let variants = [
            // node scripts/nb.cjs, node ./scripts/nb.cjs
            format!(r#"(?i)(^|\s)node\s+\.?/?{helper}"#),
            // node "scripts/nb.cjs", node './scripts/nb.cjs'
            format!(r#"(?i)(^|\s)node\s+"\.?/?{helper}""#),
            format!(r#"(?i)(^|\s)node\s+'\.?/?{helper}'"#),
            // bash -lc 'node scripts/nb.cjs ...'
            format!(r#"(?i)(bash\s+-lc\s+['"])node\s+\.?/?{helper}"#),
            // node $PWD/scripts/nb.cjs, node ${PWD}/scripts/nb.cjs
            format!(r#"(?i)(^|\s)node\s+\$?\{{?PWD\}}?[/\\]{helper}"#),
            // ./scripts/nb.cjs executed directly
            format!(r#"(?i)(^|\s)\./{helper}"#),
            format!(r#"(?i)(^|\s)"\./{helper}""#),
            format!(r#"(?i)(^|\s)'\./{helper}'"#),
        ]
        .iter()
        .map(|pattern| compile(pattern))
        .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            variants,
            repeated_node: compile(r"\bnode(?:\s+node\b)+\s+")?,
            canonical: settings.helper_invocation(),
        })
    }
}

impl RewriteRule for HelperPathRule {
    fn name(&self) -> &'static str {
        "helper-path"
    }

    fn apply(&self, command: &str) -> String {
        let mut out = command.to_string();
        for re in &self.variants {
            out = re
                .replace_all(&out, |caps: &Captures| format!("{}{}", &caps[1], self.canonical))
                .into_owned();
        }
        self.repeated_node.replace_all(&out, "node ").into_owned()
    }
}

/// Rule 2: soft-mode handling for the labelled long-running validation step.
pub struct SoftModeRule {
    label: Regex,
    ttl: Regex,
    payload: Regex,
    env_guard: Regex,
    ttl_floor_secs: u64,
    wrapper_payload: String,
    helper_invocation: String,
    env_prefix: String,
}

impl SoftModeRule {
    pub fn new(settings: &RewriteSettings) -> Result<Self> {
        let label = regex::escape(&settings.soft_label);
        let entrypoint = regex::escape(&settings.validation_entrypoint);
        let var = regex::escape(&settings.soft_env_var);
        Ok(Self {
            label: compile(&format!(r"--label\s+{label}(?:\s|$)"))?,
            ttl: compile(r"--ttl\s+(\d+)([sm])\b")?,
            payload: compile(&format!(r"bash\s+-lc\s+'[^']*{entrypoint}[^']*'"))?,
            env_guard: compile(&format!(r#"(?:^|[\s'"]){var}="#))?,
            ttl_floor_secs: settings.ttl_floor_secs,
            wrapper_payload: format!(
                "bash -lc 'node {}'",
                settings.project_path(&settings.soft_wrapper)
            ),
            helper_invocation: settings.helper_invocation(),
            env_prefix: format!("{}={}", settings.soft_env_var, settings.soft_value),
        })
    }

    fn raise_ttl(&self, caps: &Captures) -> String {
        let seconds = caps[1].parse::<u64>().ok().and_then(|value| match &caps[2] {
            "m" => value.checked_mul(60),
            _ => Some(value),
        });
        match seconds {
            Some(secs) if secs < self.ttl_floor_secs => format!("--ttl {}s", self.ttl_floor_secs),
            _ => caps[0].to_string(),
        }
    }
}

impl RewriteRule for SoftModeRule {
    fn name(&self) -> &'static str {
        "soft-mode"
    }

    fn apply(&self, command: &str) -> String {
        if !self.label.is_match(command) {
            return command.to_string();
        }
        let out = self
            .ttl
            .replace_all(command, |caps: &Captures| self.raise_ttl(caps))
            .into_owned();
        let out = self
            .payload
            .replace_all(&out, |_: &Captures| self.wrapper_payload.clone())
            .into_owned();
        if out.contains(&self.helper_invocation) && !self.env_guard.is_match(&out) {
            return out.replacen(
                &self.helper_invocation,
                &format!("{} {}", self.env_prefix, self.helper_invocation),
                1,
            );
        }
        out
    }
}

/// Rule 3: default config and smoke path for the test runner.
pub struct TestRunnerRule {
    runner: Regex,
    config_flag: Regex,
    path_flag: Regex,
    config: String,
    smoke_path: Option<String>,
}

impl TestRunnerRule {
    pub fn new(settings: &RewriteSettings) -> Result<Self> {
        let runner = settings
            .test_runner
            .split_whitespace()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"\s+");
        Ok(Self {
            runner: compile(&format!(r"(\b{runner})(\s|$)"))?,
            config_flag: compile(r"(?:^|\s)--config(?:\s|=)")?,
            path_flag: compile(r"(?:^|\s)--runTestsByPath(?:\s|=)")?,
            config: settings.test_config.clone(),
            smoke_path: settings
                .smoke_path
                .clone()
                .filter(|path| !path.trim().is_empty()),
        })
    }

    fn inject(&self, command: &str, flag: &str, value: &str) -> String {
        self.runner
            .replacen(command, 1, |caps: &Captures| {
                format!("{} {flag} {value}{}", &caps[1], &caps[2])
            })
            .into_owned()
    }
}

impl RewriteRule for TestRunnerRule {
    fn name(&self) -> &'static str {
        "test-runner"
    }

    fn apply(&self, command: &str) -> String {
        if !self.runner.is_match(command) {
            return command.to_string();
        }
        let mut out = command.to_string();
        if !self.config_flag.is_match(&out) {
            out = self.inject(&out, "--config", &self.config);
        }
        if let Some(smoke) = &self.smoke_path
            && !self.path_flag.is_match(&out)
        {
            out = self.inject(&out, "--runTestsByPath", smoke);
        }
        out
    }
}

/// Rule 4: canonical absolute path for the validation tool.
pub struct ToolPathRule {
    pattern: Regex,
    canonical: String,
}

impl ToolPathRule {
    pub fn new(settings: &RewriteSettings) -> Result<Self> {
        let dirs = settings
            .tool_dirs
            .iter()
            .map(|dir| regex::escape(dir.trim_matches('/')))
            .collect::<Vec<_>>()
            .join("|");
        let script = word_end(&regex::escape(&settings.tool_script), &settings.tool_script);
        Ok(Self {
            pattern: compile(&format!(r#"\bnode\s+[^\s'"]*(?:{dirs})/{script}"#))?,
            canonical: format!("node {}", settings.project_path(&settings.tool_canonical)),
        })
    }
}

impl RewriteRule for ToolPathRule {
    fn name(&self) -> &'static str {
        "tool-path"
    }

    fn apply(&self, command: &str) -> String {
        self.pattern
            .replace_all(command, |_: &Captures| self.canonical.clone())
            .into_owned()
    }
}
