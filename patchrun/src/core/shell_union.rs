//! Shell step extraction and order-preserving union.

use std::collections::HashSet;

use serde_json::Value;

/// `postMutationBuild.shell` of a patch document, best-effort.
///
/// Accepts an array (non-string entries dropped) or a single string. Anything else
/// yields an empty list.
pub fn post_mutation_shell(doc: &Value) -> Vec<String> {
    match doc.pointer("/postMutationBuild/shell") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

/// Concatenate `first` then `second`, keeping only the first occurrence of each
/// exact string.
pub fn union_preserving_order(first: &[String], second: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .iter()
        .chain(second)
        .filter(|step| seen.insert(step.as_str()))
        .cloned()
        .collect()
}
