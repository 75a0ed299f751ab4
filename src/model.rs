use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

// ═══════════════════════════════════════════════════════════════════════════════
// GRAMMAR
// ═══════════════════════════════════════════════════════════════════════════════

/// The three textual grammars the engine knows how to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    #[serde(alias = "css")]
    Stylesheet,
    #[serde(alias = "html")]
    Markup,
    #[serde(alias = "js", alias = "jsx", alias = "ts", alias = "tsx")]
    Script,
}

impl Grammar {
    /// Infer the grammar from a path's extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "css" => Some(Grammar::Stylesheet),
            "html" | "htm" => Some(Grammar::Markup),
            "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "mts" | "cts" => Some(Grammar::Script),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grammar::Stylesheet => "stylesheet",
            Grammar::Markup => "markup",
            Grammar::Script => "script",
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Update,
    Insert,
    Delete,
    Replace,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Update => "update",
            Operation::Insert => "insert",
            Operation::Delete => "delete",
            Operation::Replace => "replace",
        };
        f.write_str(name)
    }
}

/// Placement hint for insertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Before,
    After,
    #[serde(alias = "append")]
    Inside,
    Prepend,
}

/// Descriptor identifying what a modification acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl Target {
    pub fn selector(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            ..Self::default()
        }
    }

    pub fn identifier(identifier: &str) -> Self {
        Self {
            identifier: Some(identifier.to_string()),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, property: &str) -> Self {
        self.property = Some(property.to_string());
        self
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }
}

/// Scalar payload carried by a modification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModificationValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl ModificationValue {
    pub fn to_text(&self) -> String {
        match self {
            ModificationValue::Text(text) => text.clone(),
            ModificationValue::Number(number) => number.to_string(),
            ModificationValue::Bool(flag) => flag.to_string(),
        }
    }
}

impl From<&str> for ModificationValue {
    fn from(value: &str) -> Self {
        ModificationValue::Text(value.to_string())
    }
}

impl From<bool> for ModificationValue {
    fn from(value: bool) -> Self {
        ModificationValue::Bool(value)
    }
}

impl From<i64> for ModificationValue {
    fn from(value: i64) -> Self {
        ModificationValue::Number(value.into())
    }
}

/// One declarative edit instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modification {
    pub path: String,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub grammar: Option<Grammar>,
    pub operation: Operation,
    #[serde(default)]
    pub target: Target,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ModificationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Modification {
    pub fn new(path: &str, operation: Operation, target: Target) -> Self {
        Self {
            path: path.to_string(),
            grammar: None,
            operation,
            target,
            value: None,
            position: None,
        }
    }

    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = Some(grammar);
        self
    }

    pub fn with_value(mut self, value: impl Into<ModificationValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Rendered `value`, if any.
    pub fn value_text(&self) -> Option<String> {
        self.value.as_ref().map(ModificationValue::to_text)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Running count of structural edits, threaded through a grammar modifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModificationOutcome {
    pub applied: usize,
}

impl ModificationOutcome {
    pub fn record(&mut self, count: usize) {
        self.applied += count;
    }

    pub fn is_empty(&self) -> bool {
        self.applied == 0
    }
}

/// Per-file outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_content: Option<String>,
    pub modifications_applied: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModificationResult {
    pub fn applied(content: String, count: usize) -> Self {
        Self {
            success: true,
            modified_content: Some(content),
            modifications_applied: count,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            modified_content: None,
            modifications_applied: 0,
            error: Some(error.into()),
        }
    }
}

/// Aggregate over all files touched by one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub success: bool,
    pub updated_files: HashMap<String, String>,
    pub errors: Vec<String>,
}

impl BatchResult {
    pub fn new(files: &HashMap<String, String>) -> Self {
        Self {
            success: true,
            updated_files: files.clone(),
            errors: Vec::new(),
        }
    }

    pub fn fail(&mut self, message: String) {
        self.success = false;
        self.errors.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("styles/site.css", Some(Grammar::Stylesheet))]
    #[case("index.HTML", Some(Grammar::Markup))]
    #[case("page.htm", Some(Grammar::Markup))]
    #[case("src/App.tsx", Some(Grammar::Script))]
    #[case("lib/util.mjs", Some(Grammar::Script))]
    #[case("README.md", None)]
    #[case("Makefile", None)]
    fn test_grammar_from_path(#[case] path: &str, #[case] expected: Option<Grammar>) {
        assert_eq!(Grammar::from_path(path), expected);
    }

    #[test]
    fn test_modification_from_json() {
        let json = r##"{
            "path": "index.html",
            "type": "html",
            "operation": "insert",
            "target": { "selector": "#x" },
            "value": "<span>hi</span>",
            "position": "append"
        }"##;
        let modification: Modification = serde_json::from_str(json).unwrap();
        assert_eq!(modification.grammar, Some(Grammar::Markup));
        assert_eq!(modification.operation, Operation::Insert);
        assert_eq!(modification.position, Some(Position::Inside));
        assert_eq!(modification.target.selector.as_deref(), Some("#x"));
        assert_eq!(modification.value_text().as_deref(), Some("<span>hi</span>"));
    }

    #[test]
    fn test_scalar_values_render_as_text() {
        let json = r#"{ "path": "a.css", "operation": "update", "value": 0.5 }"#;
        let modification: Modification = serde_json::from_str(json).unwrap();
        assert_eq!(modification.value_text().as_deref(), Some("0.5"));
        assert_eq!(modification.target, Target::default());

        let json = r#"{ "path": "a.js", "operation": "update", "value": true }"#;
        let modification: Modification = serde_json::from_str(json).unwrap();
        assert_eq!(modification.value_text().as_deref(), Some("true"));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ModificationResult::applied("a {}".to_string(), 2);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["modificationsApplied"], 2);
        assert_eq!(json["modifiedContent"], "a {}");
        assert!(json.get("error").is_none());
    }
}
