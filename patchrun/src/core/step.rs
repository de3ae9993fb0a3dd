//! Typed step model.
//!
//! A rewritten command is executed directly (`program args...`) when it uses no
//! shell features; anything else (quotes, pipes, `&&`, redirections, expansions) is
//! handed to the configured shell as one string.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters that never need a shell to interpret them.
static INERT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-./=:,@%+]+$").unwrap());
static ENV_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)=(.*)$").unwrap());

/// Builtins and keywords that only exist inside a shell.
const SHELL_ONLY: &[&str] = &[
    ".", ":", "alias", "bg", "break", "builtin", "case", "cd", "command", "continue",
    "declare", "do", "done", "elif", "else", "esac", "eval", "exec", "exit", "export", "fg",
    "fi", "for", "function", "getopts", "hash", "if", "jobs", "let", "local", "pushd", "popd",
    "read", "readonly", "return", "select", "set", "shift", "source", "then", "time", "trap",
    "type", "typeset", "ulimit", "umask", "unalias", "unset", "until", "wait", "while",
];

/// How a step was executed. Recorded in the step journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMode {
    Direct,
    Shell,
}

impl fmt::Display for StepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Shell => f.write_str("shell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Direct {
        env: Vec<(String, String)>,
        program: String,
        args: Vec<String>,
    },
    Shell,
}

/// One executable patch step. `command` is the rewritten string, kept verbatim for
/// failure reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub command: String,
    pub kind: StepKind,
}

impl Step {
    /// Classify a rewritten command.
    pub fn classify(command: &str) -> Self {
        let kind = direct_invocation(command).unwrap_or(StepKind::Shell);
        Self {
            command: command.to_string(),
            kind,
        }
    }

    pub fn mode(&self) -> StepMode {
        match self.kind {
            StepKind::Direct { .. } => StepMode::Direct,
            StepKind::Shell => StepMode::Shell,
        }
    }
}

fn direct_invocation(command: &str) -> Option<StepKind> {
    let tokens: Vec<&str> = command.split_whitespace().collect();
    if tokens.is_empty() || !tokens.iter().all(|token| INERT_TOKEN.is_match(token)) {
        return None;
    }

    let mut env = Vec::new();
    let mut rest = tokens.into_iter().peekable();
    while let Some(token) = rest.peek() {
        let Some(caps) = ENV_ASSIGNMENT.captures(token) else {
            break;
        };
        env.push((caps[1].to_string(), caps[2].to_string()));
        rest.next();
    }

    let program = rest.next()?.to_string();
    if SHELL_ONLY.contains(&program.as_str()) {
        return None;
    }
    Some(StepKind::Direct {
        env,
        program,
        args: rest.map(str::to_string).collect(),
    })
}
