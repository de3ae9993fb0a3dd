//! Orchestrator configuration stored under `.patchrun/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::deps::DependencyMap;
use crate::core::rewrite::RewriteSettings;

/// Default config location relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".patchrun/config.toml";
/// Overrides `rewrite.test_config`.
pub const TEST_CONFIG_ENV: &str = "PATCHRUN_TEST_CONFIG";
/// Sets the smoke test path injected into test runner commands.
pub const SMOKE_PATH_ENV: &str = "PATCHRUN_SMOKE_PATH";

/// Orchestrator configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values below;
/// relative paths resolve against the working directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub paths: PathsConfig,
    pub exec: ExecConfig,
    pub rewrite: RewriteConfig,
    pub dependencies: DependencyConfig,
    /// `[validate]` section.
    #[serde(rename = "validate")]
    pub validation: ValidationConfig,
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Execution plan JSON (`{"executeInOrder": [...]}`).
    pub plan: PathBuf,
    /// Searched first; revised patches here shadow the fallback directory.
    pub primary_dir: PathBuf,
    pub fallback_dir: PathBuf,
    pub state: PathBuf,
    pub journal: PathBuf,
    /// Working directory for steps and prefix for canonical command paths.
    pub project_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            plan: PathBuf::from(".patchrun/plan.json"),
            primary_dir: PathBuf::from(".patchrun/patches/revisions"),
            fallback_dir: PathBuf::from(".patchrun/patches"),
            state: PathBuf::from(".patchrun/state/execution.state.json"),
            journal: PathBuf::from(".patchrun/state/steps.jsonl"),
            project_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecConfig {
    /// Program and leading args used for shell-mode steps; the command is appended.
    pub shell: Vec<String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            shell: vec!["bash".to_string(), "-lc".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RewriteConfig {
    pub helper_script: String,
    pub soft_label: String,
    pub ttl_floor_secs: u64,
    pub validation_entrypoint: String,
    pub soft_wrapper: String,
    /// Variable injected into soft-mode steps; also read from the environment.
    pub soft_env_var: String,
    pub soft_default: String,
    pub test_runner: String,
    pub test_config: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoke_path: Option<String>,
    pub tool_script: String,
    pub tool_dirs: Vec<String>,
    pub tool_canonical: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            helper_script: "scripts/nb.cjs".to_string(),
            soft_label: "ultra-runtime".to_string(),
            ttl_floor_secs: 600,
            validation_entrypoint: "ultra-runtime-validation.sh".to_string(),
            soft_wrapper: "scripts/tools/ultra-wrapper.cjs".to_string(),
            soft_env_var: "PATCHRUN_ULTRA_SOFT".to_string(),
            soft_default: "1".to_string(),
            test_runner: "npx jest".to_string(),
            test_config: "jest.config.cjs".to_string(),
            smoke_path: None,
            tool_script: "route-assert.cjs".to_string(),
            tool_dirs: vec!["scripts/validation".to_string(), "scripts/tools".to_string()],
            tool_canonical: "scripts/tools/route-assert.cjs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DependencyConfig {
    /// Start from the built-in table; `table` entries add to or replace it.
    pub use_builtin: bool,
    pub table: BTreeMap<String, Vec<String>>,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            use_builtin: true,
            table: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Commands every validated patch must declare in `postMutationBuild.shell`,
    /// e.g. `tsc --noEmit`. Empty disables the check.
    pub required_commands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OverlayConfig {
    pub output_dir: PathBuf,
    pub pairs: Vec<OverlayPair>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(".patchrun/patches/hardened-merge"),
            pairs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverlayPair {
    pub base: PathBuf,
    pub overlay: PathBuf,
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.exec.shell.is_empty() || self.exec.shell[0].trim().is_empty() {
            return Err(anyhow!("exec.shell must be a non-empty array"));
        }
        let rewrite = &self.rewrite;
        for (field, value) in [
            ("rewrite.helper_script", &rewrite.helper_script),
            ("rewrite.soft_label", &rewrite.soft_label),
            ("rewrite.validation_entrypoint", &rewrite.validation_entrypoint),
            ("rewrite.soft_wrapper", &rewrite.soft_wrapper),
            ("rewrite.test_runner", &rewrite.test_runner),
            ("rewrite.test_config", &rewrite.test_config),
            ("rewrite.tool_script", &rewrite.tool_script),
            ("rewrite.tool_canonical", &rewrite.tool_canonical),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{field} must not be empty"));
            }
        }
        if !is_env_name(&rewrite.soft_env_var) {
            return Err(anyhow!(
                "rewrite.soft_env_var must be a valid variable name, got '{}'",
                rewrite.soft_env_var
            ));
        }
        if self
            .validation
            .required_commands
            .iter()
            .any(|command| command.trim().is_empty())
        {
            return Err(anyhow!("validate.required_commands must not contain empty entries"));
        }
        if rewrite.tool_dirs.is_empty() {
            return Err(anyhow!("rewrite.tool_dirs must be a non-empty array"));
        }
        Ok(())
    }

    /// Resolve a configured path against `root`, dropping `.` components.
    pub fn resolve(&self, root: &Path, path: &Path) -> PathBuf {
        let relative: PathBuf = path
            .components()
            .filter(|component| !matches!(component, Component::CurDir))
            .collect();
        if relative.as_os_str().is_empty() {
            return root.to_path_buf();
        }
        root.join(relative)
    }

    pub fn project_dir(&self, root: &Path) -> PathBuf {
        self.resolve(root, &self.paths.project_dir)
    }

    /// Rewrite settings with environment overrides applied through `env`.
    pub fn rewrite_settings<F>(&self, root: &Path, env: F) -> RewriteSettings
    where
        F: Fn(&str) -> Option<String>,
    {
        let rewrite = &self.rewrite;
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        RewriteSettings {
            project_dir: self.project_dir(root).display().to_string(),
            helper_script: rewrite.helper_script.clone(),
            soft_label: rewrite.soft_label.clone(),
            ttl_floor_secs: rewrite.ttl_floor_secs,
            validation_entrypoint: rewrite.validation_entrypoint.clone(),
            soft_wrapper: rewrite.soft_wrapper.clone(),
            soft_env_var: rewrite.soft_env_var.clone(),
            soft_value: non_empty(env(&rewrite.soft_env_var))
                .unwrap_or_else(|| rewrite.soft_default.clone()),
            test_runner: rewrite.test_runner.clone(),
            test_config: non_empty(env(TEST_CONFIG_ENV))
                .unwrap_or_else(|| rewrite.test_config.clone()),
            smoke_path: non_empty(env(SMOKE_PATH_ENV)).or_else(|| rewrite.smoke_path.clone()),
            tool_script: rewrite.tool_script.clone(),
            tool_dirs: rewrite.tool_dirs.clone(),
            tool_canonical: rewrite.tool_canonical.clone(),
        }
    }

    pub fn dependency_map(&self) -> DependencyMap {
        let mut map = if self.dependencies.use_builtin {
            DependencyMap::builtin()
        } else {
            DependencyMap::default()
        };
        map.extend(&self.dependencies.table);
        map
    }
}

/// Environment exported to every step so wrapped tools see the effective values.
pub fn step_env(settings: &RewriteSettings) -> Vec<(String, String)> {
    vec![
        (TEST_CONFIG_ENV.to_string(), settings.test_config.clone()),
        (
            SMOKE_PATH_ENV.to_string(),
            settings.smoke_path.clone().unwrap_or_default(),
        ),
        (settings.soft_env_var.clone(), settings.soft_value.clone()),
    ]
}

fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `OrchestratorConfig::default()`.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig> {
    if !path.exists() {
        let cfg = OrchestratorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: OrchestratorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &OrchestratorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, OrchestratorConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let mut cfg = OrchestratorConfig::default();
        cfg.dependencies
            .table
            .insert("P2".to_string(), vec!["P1".to_string()]);
        cfg.overlay.pairs.push(OverlayPair {
            base: PathBuf::from("base.json"),
            overlay: PathBuf::from("base_HARDENED.overlay.json"),
        });
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[exec]\nshell = [\"sh\", \"-c\"]\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.exec.shell, vec!["sh", "-c"]);
        assert_eq!(cfg.paths, PathsConfig::default());
    }

    #[test]
    fn reads_required_commands_section() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[validate]\nrequired_commands = [\"tsc --noEmit\", \"eslint\"]\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.validation.required_commands, vec!["tsc --noEmit", "eslint"]);

        fs::write(&path, "[validate]\nrequired_commands = [\" \"]\n").expect("write");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn rejects_empty_shell() {
        let mut cfg = OrchestratorConfig::default();
        cfg.exec.shell.clear();
        let err = cfg.validate().expect_err("invalid");
        assert!(err.to_string().contains("exec.shell"));
    }

    #[test]
    fn rejects_bad_soft_env_var() {
        let mut cfg = OrchestratorConfig::default();
        cfg.rewrite.soft_env_var = "1BAD-NAME".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_rewrite_defaults() {
        let cfg = OrchestratorConfig::default();
        let settings = cfg.rewrite_settings(Path::new("/work/app"), |key| match key {
            TEST_CONFIG_ENV => Some("jest.ci.cjs".to_string()),
            SMOKE_PATH_ENV => Some("tests/smoke.test.ts".to_string()),
            "PATCHRUN_ULTRA_SOFT" => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(settings.project_dir, "/work/app");
        assert_eq!(settings.test_config, "jest.ci.cjs");
        assert_eq!(settings.smoke_path.as_deref(), Some("tests/smoke.test.ts"));
        assert_eq!(settings.soft_value, "0");
    }

    #[test]
    fn blank_env_values_fall_back_to_config() {
        let cfg = OrchestratorConfig::default();
        let settings = cfg.rewrite_settings(Path::new("/w"), |_| Some(String::new()));
        assert_eq!(settings.test_config, "jest.config.cjs");
        assert_eq!(settings.smoke_path, None);
        assert_eq!(settings.soft_value, "1");
    }

    #[test]
    fn resolve_drops_cur_dir_and_keeps_absolute() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.project_dir(Path::new("/w")), PathBuf::from("/w"));
        assert_eq!(
            cfg.resolve(Path::new("/w"), Path::new("./a/b")),
            PathBuf::from("/w/a/b")
        );
        assert_eq!(
            cfg.resolve(Path::new("/w"), Path::new("/abs/plan.json")),
            PathBuf::from("/abs/plan.json")
        );
    }

    #[test]
    fn dependency_table_can_replace_builtin() {
        let mut cfg = OrchestratorConfig::default();
        cfg.dependencies.use_builtin = false;
        assert!(cfg.dependency_map().is_empty());
        cfg.dependencies
            .table
            .insert("P2".to_string(), vec!["P1".to_string()]);
        assert_eq!(cfg.dependency_map().iter().count(), 1);
    }

    #[test]
    fn step_env_exports_effective_values() {
        let cfg = OrchestratorConfig::default();
        let settings = cfg.rewrite_settings(Path::new("/w"), |_| None);
        let env = step_env(&settings);
        assert!(env.contains(&(TEST_CONFIG_ENV.to_string(), "jest.config.cjs".to_string())));
        assert!(env.contains(&("PATCHRUN_ULTRA_SOFT".to_string(), "1".to_string())));
    }
}
