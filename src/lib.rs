//! # Structural Modification Engine
//!
//! Applies batches of declarative edits to stylesheet, markup and script
//! files without regenerating them from scratch. Each file is parsed into a
//! tree, every modification addressed to it is located and applied, and the
//! tree is serialized back to text.
//!
//! ## Guarantees
//!
//! 1. **File atomicity**: a file either gets all of its modifications or
//!    keeps its original text.
//! 2. **No-op is failure**: a file whose modifications matched nothing is
//!    reported as failed, so a caller learns its descriptor was wrong.
//! 3. **Batch independence**: one failing file never stops the others.
//!    `BatchResult::success` is true only when no file failed.
//!
//! ## Entry points
//!
//! - [`apply`] / [`apply_with_options`] for Rust callers.
//! - `apply_modifications_native` (feature `napi`) for a Node.js host,
//!   taking and returning JSON-shaped values.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod arena;
mod batch;
mod error;
mod locate;
mod markup;
mod model;
mod modifier;
mod options;
mod script;
mod stylesheet;

#[cfg(test)]
mod markup_tests;

pub use arena::{Arena, NodeId};
pub use batch::{apply, apply_with_options};
pub use error::{ModifyError, Result};
pub use locate::{Locator, SelectorPattern, SimpleSelector};
pub use markup::{parse_markup, serialize_markup, ElementLocator, MarkupModifier, MarkupNode, MarkupTree};
pub use model::{
    BatchResult, Grammar, Modification, ModificationOutcome, ModificationResult,
    ModificationValue, Operation, Position, Target,
};
pub use modifier::{dispatch, GrammarModifier};
pub use options::{MarkupOptions, ModifierOptions, ScriptOptions, StylesheetOptions};
pub use script::{NodeKey, ScriptLocator, ScriptModifier, ScriptNodeKind, ScriptNodeRef, IMPORT_SENTINEL};
pub use stylesheet::{
    parse_stylesheet, serialize_stylesheet, CssNode, RuleLocator, Stylesheet, StylesheetModifier,
};

/// Node.js entry point. `modifications` is a JSON array of modification
/// records; the return value is a serialized [`BatchResult`].
#[cfg(feature = "napi")]
#[napi]
pub fn apply_modifications_native(
    files: std::collections::HashMap<String, String>,
    modifications: serde_json::Value,
) -> napi::Result<serde_json::Value> {
    let modifications: Vec<Modification> = serde_json::from_value(modifications)
        .map_err(|e| napi::Error::from_reason(format!("Invalid modifications: {}", e)))?;
    let result = apply(&files, &modifications);
    serde_json::to_value(result).map_err(|e| napi::Error::from_reason(e.to_string()))
}
