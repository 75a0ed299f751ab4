use serde::{Deserialize, Serialize};

/// Formatting and parsing knobs for the grammar modifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModifierOptions {
    pub stylesheet: StylesheetOptions,
    pub markup: MarkupOptions,
    pub script: ScriptOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StylesheetOptions {
    /// Indentation for one nesting level.
    pub indent: String,
    /// Text placed between top-level rules.
    pub rule_separator: String,
}

impl Default for StylesheetOptions {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            rule_separator: "\n\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkupOptions {
    /// Keep `<html>` documents whole instead of treating input as a body fragment.
    pub preserve_document: bool,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self {
            preserve_document: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptOptions {
    pub single_quote: bool,
}
