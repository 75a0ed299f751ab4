//! Grammar modifier contract and the dispatcher that routes a file to it.
//!
//! A modifier owns its parsed tree for the duration of one file: it parses,
//! folds every modification of the group into the tree in input order, and
//! serializes once at the end. Any error leaves the file untouched.

use tracing::{debug, warn};

use crate::error::{ModifyError, Result};
use crate::markup::MarkupModifier;
use crate::model::{Grammar, Modification, ModificationOutcome, ModificationResult};
use crate::options::ModifierOptions;
use crate::script::ScriptModifier;
use crate::stylesheet::StylesheetModifier;

pub trait GrammarModifier {
    /// Backing storage the tree borrows from (the script grammar's arena allocator).
    type Arena: Default;
    type Tree<'a>;

    fn grammar(&self) -> Grammar;

    fn parse<'a>(&self, arena: &'a Self::Arena, path: &str, source: &'a str)
        -> Result<Self::Tree<'a>>;

    /// Locate the nodes described by `modification` and apply the operation.
    /// Returns how many structural edits were made.
    fn mutate<'a>(
        &self,
        arena: &'a Self::Arena,
        tree: &mut Self::Tree<'a>,
        modification: &Modification,
    ) -> Result<usize>;

    fn serialize(&self, tree: &Self::Tree<'_>) -> Result<String>;

    fn modify(
        &self,
        path: &str,
        source: &str,
        modifications: &[&Modification],
    ) -> Result<(String, ModificationOutcome)> {
        let arena = Self::Arena::default();
        let mut tree = self.parse(&arena, path, source)?;
        let mut outcome = ModificationOutcome::default();
        for modification in modifications {
            let count = self.mutate(&arena, &mut tree, modification)?;
            debug!(
                grammar = %self.grammar(),
                path,
                operation = %modification.operation,
                count,
                "applied modification"
            );
            outcome.record(count);
        }
        let content = self.serialize(&tree)?;
        Ok((content, outcome))
    }

    /// Run [`GrammarModifier::modify`] and fold its outcome into a result.
    /// A group that matched nothing is a failure.
    fn apply(&self, path: &str, source: &str, modifications: &[&Modification]) -> ModificationResult {
        let result = self
            .modify(path, source, modifications)
            .and_then(|(content, outcome)| {
                if outcome.is_empty() {
                    Err(ModifyError::NoModificationsApplied)
                } else {
                    Ok((content, outcome))
                }
            });

        match result {
            Ok((content, outcome)) => ModificationResult::applied(content, outcome.applied),
            Err(err) => {
                warn!(grammar = %self.grammar(), path, error = %err, "file modification failed");
                ModificationResult::failed(err.to_string())
            }
        }
    }
}

/// Route one file's modification group to the modifier for its grammar.
pub fn dispatch(
    grammar: Grammar,
    path: &str,
    source: &str,
    modifications: &[&Modification],
    options: &ModifierOptions,
) -> ModificationResult {
    debug!(%grammar, path, count = modifications.len(), "dispatching file");
    match grammar {
        Grammar::Stylesheet => {
            StylesheetModifier::new(&options.stylesheet).apply(path, source, modifications)
        }
        Grammar::Markup => MarkupModifier::new(&options.markup).apply(path, source, modifications),
        Grammar::Script => ScriptModifier::new(&options.script).apply(path, source, modifications),
    }
}

/// Fetch the `value` an operation needs, or fail the file.
pub(crate) fn required_value(modification: &Modification) -> Result<String> {
    modification.value_text().ok_or_else(|| {
        ModifyError::invalid(format!(
            "'{}' on {} requires a value",
            modification.operation, modification.path
        ))
    })
}
