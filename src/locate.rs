//! Node location shared by the grammar modifiers.
//!
//! Each grammar implements [`Locator`] over its own tree type. Matching is
//! intentionally shallow: a descriptor is compared against a node's own
//! selector, tag or name, never against its ancestry.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ModifyError, Result};
use crate::model::Target;

/// Finds the nodes of a tree described by a [`Target`].
///
/// Results are in document order. An empty result is not an error; the
/// modifier decides what a zero match means.
pub trait Locator<T: ?Sized> {
    type NodeRef;

    fn locate(&self, tree: &T, target: &Target) -> Result<Vec<Self::NodeRef>>;
}

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// STYLESHEET SELECTOR PATTERNS
// ═══════════════════════════════════════════════════════════════════════════════

/// Exact-or-pattern match against a rule's own selector text.
#[derive(Debug, Clone)]
pub enum SelectorPattern {
    Exact(String),
    /// Written as `/pattern/` in the descriptor.
    Pattern(Regex),
}

impl SelectorPattern {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let trimmed = descriptor.trim();
        if trimmed.len() > 2 && trimmed.starts_with('/') && trimmed.ends_with('/') {
            let source = &trimmed[1..trimmed.len() - 1];
            let regex = Regex::new(source).map_err(|e| {
                ModifyError::invalid(format!("Bad selector pattern '{}': {}", descriptor, e))
            })?;
            return Ok(SelectorPattern::Pattern(regex));
        }
        Ok(SelectorPattern::Exact(normalize_whitespace(trimmed)))
    }

    pub fn matches(&self, selector: &str) -> bool {
        match self {
            SelectorPattern::Exact(wanted) => {
                normalize_whitespace(selector) == *wanted
                    || selector
                        .split(',')
                        .any(|part| normalize_whitespace(part) == *wanted)
            }
            SelectorPattern::Pattern(regex) => regex.is_match(selector),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKUP SIMPLE SELECTORS
// ═══════════════════════════════════════════════════════════════════════════════

/// The three selector forms the markup locator understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    /// Tag-name equality (ASCII case-insensitive).
    Tag(String),
    /// Substring of the `class` attribute value, not a token match.
    Class(String),
    /// Exact `id` attribute value.
    Id(String),
}

impl SimpleSelector {
    pub fn parse(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        if let Some(class) = selector.strip_prefix('.') {
            if class.is_empty() {
                return Err(ModifyError::invalid("Empty class selector"));
            }
            Ok(SimpleSelector::Class(class.to_string()))
        } else if let Some(id) = selector.strip_prefix('#') {
            if id.is_empty() {
                return Err(ModifyError::invalid("Empty id selector"));
            }
            Ok(SimpleSelector::Id(id.to_string()))
        } else if selector.is_empty() {
            Err(ModifyError::invalid("Empty selector"))
        } else {
            Ok(SimpleSelector::Tag(selector.to_ascii_lowercase()))
        }
    }

    /// `attribute` looks up an attribute value on the candidate element.
    pub fn matches<'v>(&self, tag: &str, attribute: impl Fn(&str) -> Option<&'v str>) -> bool {
        match self {
            SimpleSelector::Tag(name) => tag.eq_ignore_ascii_case(name),
            SimpleSelector::Class(class) => attribute("class")
                .map(|value| value.contains(class.as_str()))
                .unwrap_or(false),
            SimpleSelector::Id(id) => attribute("id") == Some(id.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(".btn", ".btn", true)]
    #[case(".btn", "  .btn ", true)]
    #[case("a:hover", "a, a:hover", true)]
    #[case(".card  .title", ".card .title", true)]
    #[case(".btn", ".btn-primary", false)]
    #[case(".btn", "div .btn", false)]
    #[case("/^h[1-3]$/", "h2", true)]
    #[case("/^h[1-3]$/", "h4", false)]
    fn test_selector_pattern(#[case] descriptor: &str, #[case] selector: &str, #[case] hit: bool) {
        let pattern = SelectorPattern::parse(descriptor).unwrap();
        assert_eq!(pattern.matches(selector), hit);
    }

    #[test]
    fn test_bad_pattern_is_invalid_modification() {
        let err = SelectorPattern::parse("/(/").unwrap_err();
        assert!(matches!(err, ModifyError::InvalidModification(_)));
    }

    #[test]
    fn test_simple_selector_forms() {
        assert_eq!(
            SimpleSelector::parse("DIV").unwrap(),
            SimpleSelector::Tag("div".to_string())
        );
        assert_eq!(
            SimpleSelector::parse(".card").unwrap(),
            SimpleSelector::Class("card".to_string())
        );
        assert_eq!(
            SimpleSelector::parse("#main").unwrap(),
            SimpleSelector::Id("main".to_string())
        );
        assert!(SimpleSelector::parse("#").is_err());
    }

    #[test]
    fn test_class_selector_is_substring_match() {
        let selector = SimpleSelector::parse(".card").unwrap();
        let attrs = |name: &str| if name == "class" { Some("big-cards") } else { None };
        assert!(selector.matches("div", attrs));

        let id = SimpleSelector::parse("#main").unwrap();
        let attrs = |name: &str| if name == "id" { Some("main-content") } else { None };
        assert!(!id.matches("div", attrs));
    }
}
