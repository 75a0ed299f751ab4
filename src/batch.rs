//! Batch applier: groups a request's modifications by file and folds each
//! file's result into one [`BatchResult`].
//!
//! Files are atomic, the batch is not. A failing file keeps its original
//! text and adds one message to `errors`; every other file still runs.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::ModifyError;
use crate::model::{BatchResult, Grammar, Modification};
use crate::modifier::dispatch;
use crate::options::ModifierOptions;

/// Apply `modifications` to `files` with default options.
pub fn apply(files: &HashMap<String, String>, modifications: &[Modification]) -> BatchResult {
    apply_with_options(files, modifications, &ModifierOptions::default())
}

pub fn apply_with_options(
    files: &HashMap<String, String>,
    modifications: &[Modification],
    options: &ModifierOptions,
) -> BatchResult {
    let mut result = BatchResult::new(files);

    for (path, group) in group_by_path(modifications) {
        let Some(source) = files.get(path) else {
            warn!(path, "modification targets a file that was not provided");
            result.fail(ModifyError::FileNotFound(path.to_string()).to_string());
            continue;
        };

        let grammar = group
            .first()
            .and_then(|first| first.grammar)
            .or_else(|| Grammar::from_path(path));
        let Some(grammar) = grammar else {
            warn!(path, "could not infer grammar");
            result.fail(ModifyError::UnknownGrammar(path.to_string()).to_string());
            continue;
        };

        let outcome = dispatch(grammar, path, source, &group, options);
        match (outcome.success, outcome.modified_content) {
            (true, Some(content)) => {
                debug!(path, applied = outcome.modifications_applied, "file updated");
                result.updated_files.insert(path.to_string(), content);
            }
            (_, _) => {
                let error = outcome
                    .error
                    .unwrap_or_else(|| ModifyError::NoModificationsApplied.to_string());
                result.fail(format!("Failed to modify {}: {}", path, error));
            }
        }
    }

    debug!(
        success = result.success,
        errors = result.errors.len(),
        "batch complete"
    );
    result
}

/// Group by path, keeping first-seen path order and input order within a group.
fn group_by_path(modifications: &[Modification]) -> Vec<(&str, Vec<&Modification>)> {
    let mut groups: Vec<(&str, Vec<&Modification>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for modification in modifications {
        let path = modification.path.as_str();
        match index.get(path) {
            Some(&i) => groups[i].1.push(modification),
            None => {
                index.insert(path, groups.len());
                groups.push((path, vec![modification]));
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Operation, Target};

    #[test]
    fn test_grouping_preserves_order() {
        let mods = vec![
            Modification::new("b.css", Operation::Delete, Target::selector(".x")),
            Modification::new("a.css", Operation::Delete, Target::selector(".y")),
            Modification::new("b.css", Operation::Delete, Target::selector(".z")),
        ];
        let groups = group_by_path(&mods);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "b.css");
        assert_eq!(groups[1].0, "a.css");
        let selectors: Vec<_> = groups[0]
            .1
            .iter()
            .map(|m| m.target.selector.as_deref().unwrap())
            .collect();
        assert_eq!(selectors, vec![".x", ".z"]);
    }
}
