//! Property-based tests for command rewriting and shell step merging.
//!
//! Rewrite inputs are composed from fragments that exercise every rule (helper path
//! spellings, soft-mode labels and payloads, test runner flags, tool paths) mixed
//! with unrelated tokens.

use std::collections::HashSet;
use std::path::Path;

use patchrun::core::rewrite::Rewriter;
use patchrun::core::shell_union::union_preserving_order;
use patchrun::core::step::{Step, StepKind};
use patchrun::io::config::{OrchestratorConfig, SMOKE_PATH_ENV};
use proptest::prelude::*;

fn rewriter(smoke: bool) -> Rewriter {
    let settings = OrchestratorConfig::default().rewrite_settings(Path::new("/work/app"), |key| {
        (smoke && key == SMOKE_PATH_ENV).then(|| "tests/smoke.test.ts".to_string())
    });
    Rewriter::new(&settings).expect("rewriter")
}

/// Strategy for command fragments touching each rewrite rule.
fn fragment_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("node scripts/nb.cjs"),
        Just("node ./scripts/nb.cjs"),
        Just("./scripts/nb.cjs"),
        Just("node $PWD/scripts/nb.cjs"),
        Just("node"),
        Just("--ttl 30s"),
        Just("--ttl 15m"),
        Just("--label ultra-runtime"),
        Just("--label jest-smoke"),
        Just("--"),
        Just("bash -lc '/x/ultra-runtime-validation.sh --strict'"),
        Just("bash -lc 'npx jest --runInBand'"),
        Just("bash -lc 'node scripts/nb.cjs -- true'"),
        Just("npx jest"),
        Just("--config jest.ci.cjs"),
        Just("node scripts/validation/route-assert.cjs"),
        Just("node ../scripts/tools/route-assert.cjs"),
        Just("PATCHRUN_ULTRA_SOFT=0"),
        Just("&&"),
        Just("echo ok"),
        Just("true"),
    ]
}

fn command_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(fragment_strategy(), 0..8).prop_map(|parts| parts.join(" "))
}

proptest! {
    /// rewrite(rewrite(c)) == rewrite(c)
    #[test]
    fn rewrite_is_idempotent(command in command_strategy(), smoke in any::<bool>()) {
        let rewriter = rewriter(smoke);
        let once = rewriter.rewrite(&command);
        let twice = rewriter.rewrite(&once);
        prop_assert_eq!(twice, once);
    }

    /// Commands with no rule trigger pass through byte-for-byte.
    #[test]
    fn unrelated_commands_are_untouched(command in "[a-z][a-z0-9 _./=-]{0,40}") {
        prop_assume!(!command.contains("node") && !command.contains("jest"));
        prop_assume!(!command.contains("nb.cjs") && !command.contains("--label"));
        prop_assert_eq!(rewriter(true).rewrite(&command), command);
    }

    /// Direct steps preserve every token of the rewritten command.
    #[test]
    fn direct_classification_keeps_tokens(command in command_strategy()) {
        let rewritten = rewriter(false).rewrite(&command);
        let step = Step::classify(&rewritten);
        prop_assert_eq!(&step.command, &rewritten);
        if let StepKind::Direct { env, program, args } = step.kind {
            let mut tokens: Vec<String> = env
                .into_iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            tokens.push(program);
            tokens.extend(args);
            let expected: Vec<&str> = rewritten.split_whitespace().collect();
            prop_assert_eq!(tokens, expected);
        }
    }
}

/// Short step strings from a small alphabet so both sides overlap often.
fn steps_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-d]{1,2}( [a-d])?", 0..10)
}

proptest! {
    /// Union contains every input string exactly once, overlay-side order first.
    #[test]
    fn union_keeps_each_step_once(first in steps_strategy(), second in steps_strategy()) {
        let merged = union_preserving_order(&first, &second);

        let unique: HashSet<&String> = merged.iter().collect();
        prop_assert_eq!(unique.len(), merged.len());
        let inputs: HashSet<&String> = first.iter().chain(&second).collect();
        prop_assert_eq!(unique, inputs);

        let mut expected_prefix: Vec<&String> = Vec::new();
        for step in &first {
            if !expected_prefix.contains(&step) {
                expected_prefix.push(step);
            }
        }
        let prefix: Vec<&String> = merged.iter().take(expected_prefix.len()).collect();
        prop_assert_eq!(prefix, expected_prefix);
    }
}
