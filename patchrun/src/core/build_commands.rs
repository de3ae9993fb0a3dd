//! Required build command check over a patch's declared steps.

use std::fmt;

/// A patch whose `postMutationBuild.shell` lacks some required commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingBuildCommands {
    pub patch: String,
    pub missing: Vec<String>,
}

impl fmt::Display for MissingBuildCommands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FAIL {} (missing build commands: {})",
            self.patch,
            self.missing.join(", ")
        )
    }
}

/// Required commands not contained in any step. A command counts as present when
/// some step includes it verbatim, so extra flags and wrappers are allowed.
pub fn missing_commands<S: AsRef<str>>(steps: &[S], required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|command| {
            !steps
                .iter()
                .any(|step| step.as_ref().contains(command.as_str()))
        })
        .cloned()
        .collect()
}

/// `None` when every required command is present.
pub fn check_patch<S: AsRef<str>>(
    patch: &str,
    steps: &[S],
    required: &[String],
) -> Option<MissingBuildCommands> {
    let missing = missing_commands(steps, required);
    (!missing.is_empty()).then(|| MissingBuildCommands {
        patch: patch.to_string(),
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Vec<String> {
        vec!["tsc --noEmit".to_string(), "eslint".to_string()]
    }

    #[test]
    fn commands_embedded_in_wrappers_count() {
        let steps = [
            "bash -lc 'tsc --noEmit --skipLibCheck'",
            "npx eslint . --max-warnings=0",
        ];
        assert!(missing_commands(&steps, &required()).is_empty());
        assert_eq!(check_patch("P1", &steps, &required()), None);
    }

    #[test]
    fn reports_missing_in_required_order() {
        let steps = ["yarn test:unit"];
        let finding = check_patch("P1", &steps, &required()).expect("finding");
        assert_eq!(finding.missing, vec!["tsc --noEmit", "eslint"]);
        assert_eq!(
            finding.to_string(),
            "FAIL P1 (missing build commands: tsc --noEmit, eslint)"
        );
    }

    #[test]
    fn empty_requirement_always_passes() {
        let steps: [&str; 0] = [];
        assert_eq!(check_patch("P1", &steps, &[]), None);
    }
}
