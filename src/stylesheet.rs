//! Stylesheet grammar.
//!
//! Stylesheets are tokenized with `cssparser` and folded into an index arena
//! of rules, at-rules, declarations and comments. The parser never rejects
//! input: stray braces and semicolons are skipped, and an unterminated
//! declaration simply runs to the end of its block.

use cssparser::{ParseError, Parser, ParserInput, Token};
use tracing::debug;

use crate::arena::{Arena, NodeId};
use crate::error::{ModifyError, Result};
use crate::locate::{Locator, SelectorPattern};
use crate::model::{Grammar, Modification, Operation, Position, Target};
use crate::modifier::{required_value, GrammarModifier};
use crate::options::StylesheetOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssNode {
    Root,
    Rule { selector: String },
    AtRule { name: String, params: String, block: bool },
    Declaration { property: String, value: String },
    Comment(String),
}

pub type Stylesheet = Arena<CssNode>;

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parse_stylesheet(source: &str) -> Stylesheet {
    let mut sheet = Stylesheet::with_root(CssNode::Root);
    let root = sheet.root();
    for id in parse_detached(&mut sheet, source) {
        sheet.append_child(root, id);
    }
    sheet
}

fn is_rule(node: &CssNode) -> bool {
    matches!(node, CssNode::Rule { .. } | CssNode::AtRule { .. })
}

/// Parse `text` into nodes of `sheet` that are not yet attached anywhere.
fn parse_detached(sheet: &mut Stylesheet, text: &str) -> Vec<NodeId> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    parse_items(&mut parser, sheet)
}

/// Parse the items of one block level: rules, at-rules, declarations, comments.
fn parse_items<'i, 't>(input: &mut Parser<'i, 't>, sheet: &mut Stylesheet) -> Vec<NodeId> {
    let mut items = Vec::new();

    loop {
        let start = input.position();
        let first = match input.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        match first {
            // Stray separators between items
            Token::WhiteSpace(_) | Token::Semicolon | Token::CloseCurlyBracket => continue,
            Token::Comment(text) => {
                items.push(sheet.alloc(CssNode::Comment(text.trim().to_string())));
                continue;
            }
            _ => {}
        }

        let mut opens_block = matches!(first, Token::CurlyBracketBlock);
        let mut terminated = opens_block;
        while !terminated {
            match input.next_including_whitespace_and_comments() {
                Ok(Token::Semicolon) => terminated = true,
                Ok(Token::CurlyBracketBlock) => {
                    opens_block = true;
                    terminated = true;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }

        let raw = input.slice_from(start);
        if opens_block {
            let prelude = raw.trim_end().trim_end_matches('{').trim().to_string();
            let children = input
                .parse_nested_block(|block| Ok::<_, ParseError<'i, ()>>(parse_items(block, sheet)))
                .unwrap_or_default();
            let id = sheet.alloc(block_node(&prelude));
            for child in children {
                sheet.append_child(id, child);
            }
            items.push(id);
        } else {
            let text = raw.trim().trim_end_matches(';').trim();
            match leaf_node(text) {
                Some(node) => items.push(sheet.alloc(node)),
                None => debug!(text, "skipping unrecognized stylesheet item"),
            }
        }
    }

    items
}

fn split_at_rule(prelude: &str) -> (String, String) {
    let body = prelude.trim_start_matches('@');
    let end = body
        .find(|c: char| c.is_whitespace() || c == '(' || c == '"' || c == '\'')
        .unwrap_or(body.len());
    (body[..end].to_string(), body[end..].trim().to_string())
}

fn block_node(prelude: &str) -> CssNode {
    if prelude.starts_with('@') {
        let (name, params) = split_at_rule(prelude);
        CssNode::AtRule {
            name,
            params,
            block: true,
        }
    } else {
        CssNode::Rule {
            selector: prelude.to_string(),
        }
    }
}

fn leaf_node(text: &str) -> Option<CssNode> {
    if text.is_empty() {
        return None;
    }
    if text.starts_with('@') {
        let (name, params) = split_at_rule(text);
        return Some(CssNode::AtRule {
            name,
            params,
            block: false,
        });
    }
    let (property, value) = text.split_once(':')?;
    let property = property.trim();
    if property.is_empty() {
        return None;
    }
    Some(CssNode::Declaration {
        property: property.to_string(),
        value: value.trim().to_string(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn serialize_stylesheet(sheet: &Stylesheet, options: &StylesheetOptions) -> String {
    let blocks: Vec<String> = sheet
        .children(sheet.root())
        .iter()
        .map(|id| {
            let mut out = String::new();
            write_node(sheet, *id, 0, options, &mut out);
            out
        })
        .collect();

    if blocks.is_empty() {
        return String::new();
    }
    let mut out = blocks.join(&options.rule_separator);
    out.push('\n');
    out
}

fn write_node(sheet: &Stylesheet, id: NodeId, depth: usize, options: &StylesheetOptions, out: &mut String) {
    let indent = options.indent.repeat(depth);
    out.push_str(&indent);
    match sheet.get(id) {
        CssNode::Root => {}
        CssNode::Rule { selector } => {
            out.push_str(selector);
            write_block(sheet, id, depth, options, out);
        }
        CssNode::AtRule {
            name,
            params,
            block,
        } => {
            out.push('@');
            out.push_str(name);
            if !params.is_empty() {
                out.push(' ');
                out.push_str(params);
            }
            if *block {
                write_block(sheet, id, depth, options, out);
            } else {
                out.push(';');
            }
        }
        CssNode::Declaration { property, value } => {
            out.push_str(property);
            out.push_str(": ");
            out.push_str(value);
            out.push(';');
        }
        CssNode::Comment(text) => {
            out.push_str("/* ");
            out.push_str(text);
            out.push_str(" */");
        }
    }
}

fn write_block(sheet: &Stylesheet, id: NodeId, depth: usize, options: &StylesheetOptions, out: &mut String) {
    let children = sheet.children(id);
    if children.is_empty() {
        out.push_str(" {}");
        return;
    }
    out.push_str(" {\n");
    for child in children {
        write_node(sheet, *child, depth + 1, options, out);
        out.push('\n');
    }
    out.push_str(&options.indent.repeat(depth));
    out.push('}');
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATION & MUTATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Matches rules by their own selector text, including rules nested in at-rules.
pub struct RuleLocator;

impl Locator<Stylesheet> for RuleLocator {
    type NodeRef = NodeId;

    fn locate(&self, sheet: &Stylesheet, target: &Target) -> Result<Vec<NodeId>> {
        let selector = target
            .selector
            .as_deref()
            .ok_or_else(|| ModifyError::invalid("Stylesheet modifications require a selector"))?;
        let pattern = SelectorPattern::parse(selector)?;

        Ok(sheet
            .descendants(sheet.root())
            .into_iter()
            .filter(|id| matches!(sheet.get(*id), CssNode::Rule { selector } if pattern.matches(selector)))
            .collect())
    }
}

fn declarations_named(sheet: &Stylesheet, rule: NodeId, property: &str) -> Vec<NodeId> {
    sheet
        .children(rule)
        .iter()
        .copied()
        .filter(|id| {
            matches!(sheet.get(*id), CssNode::Declaration { property: p, .. } if p.eq_ignore_ascii_case(property))
        })
        .collect()
}

pub struct StylesheetModifier<'o> {
    options: &'o StylesheetOptions,
}

impl<'o> StylesheetModifier<'o> {
    pub fn new(options: &'o StylesheetOptions) -> Self {
        Self { options }
    }

    fn update(&self, sheet: &mut Stylesheet, rules: &[NodeId], property: &str, value: &str) -> usize {
        let mut count = 0;
        for rule in rules {
            for id in declarations_named(sheet, *rule, property) {
                if let CssNode::Declaration { value: current, .. } = sheet.get_mut(id) {
                    *current = value.to_string();
                    count += 1;
                }
            }
        }
        count
    }

    fn insert_declaration(
        &self,
        sheet: &mut Stylesheet,
        rules: &[NodeId],
        property: &str,
        value: &str,
        position: Option<Position>,
    ) -> usize {
        for rule in rules {
            let id = sheet.alloc(CssNode::Declaration {
                property: property.trim().to_string(),
                value: value.trim().trim_end_matches(';').trim().to_string(),
            });
            match position {
                Some(Position::Prepend) | Some(Position::Before) => sheet.insert_child(*rule, 0, id),
                _ => sheet.append_child(*rule, id),
            }
        }
        rules.len()
    }

    fn insert_rules(&self, sheet: &mut Stylesheet, value: &str) -> Result<usize> {
        let nodes = parse_detached(sheet, value);
        let stray = nodes
            .iter()
            .any(|id| matches!(sheet.get(*id), CssNode::Declaration { .. }));
        if stray || !nodes.iter().any(|id| is_rule(sheet.get(*id))) {
            return Err(ModifyError::parse(
                Grammar::Stylesheet,
                format!("inserted value contains no rules: '{}'", value),
            ));
        }
        let root = sheet.root();
        for id in &nodes {
            sheet.append_child(root, *id);
        }
        Ok(nodes.len())
    }

    fn delete(&self, sheet: &mut Stylesheet, rules: &[NodeId], property: Option<&str>) -> usize {
        match property {
            Some(property) => {
                let mut count = 0;
                for rule in rules {
                    for id in declarations_named(sheet, *rule, property) {
                        sheet.detach(id);
                        count += 1;
                    }
                }
                count
            }
            None => {
                for rule in rules {
                    sheet.detach(*rule);
                }
                rules.len()
            }
        }
    }

    /// Only the first matching rule is replaced.
    fn replace(&self, sheet: &mut Stylesheet, rules: &[NodeId], value: &str) -> Result<usize> {
        let Some(first) = rules.first() else {
            return Ok(0);
        };
        let parsed = parse_detached(sheet, value);
        let replacement = parsed
            .into_iter()
            .find(|id| !matches!(sheet.get(*id), CssNode::Comment(_)))
            .filter(|id| {
                matches!(
                    sheet.get(*id),
                    CssNode::Rule { .. } | CssNode::AtRule { block: true, .. }
                )
            })
            .ok_or_else(|| {
                ModifyError::parse(
                    Grammar::Stylesheet,
                    format!("replacement value contains no rule: '{}'", value),
                )
            })?;
        Ok(usize::from(sheet.replace(*first, replacement)))
    }
}

impl GrammarModifier for StylesheetModifier<'_> {
    type Arena = ();
    type Tree<'a> = Stylesheet;

    fn grammar(&self) -> Grammar {
        Grammar::Stylesheet
    }

    fn parse<'a>(&self, _arena: &'a (), _path: &str, source: &'a str) -> Result<Stylesheet> {
        Ok(parse_stylesheet(source))
    }

    fn mutate<'a>(
        &self,
        _arena: &'a (),
        sheet: &mut Stylesheet,
        modification: &Modification,
    ) -> Result<usize> {
        let target = &modification.target;
        let property = target.property.as_deref();

        // Root-level rule insertion needs no selector.
        let root_insert = modification.operation == Operation::Insert && property.is_none();
        let rules = if root_insert {
            Vec::new()
        } else {
            let rules = RuleLocator.locate(sheet, target)?;
            debug!(selector = ?target.selector, matched = rules.len(), "located stylesheet rules");
            rules
        };

        match (modification.operation, property) {
            (Operation::Update, Some(property)) => {
                let value = required_value(modification)?;
                Ok(self.update(sheet, &rules, property, &value))
            }
            (Operation::Update, None) => Err(ModifyError::invalid(
                "Stylesheet update requires a property",
            )),
            (Operation::Insert, Some(property)) => {
                let value = required_value(modification)?;
                Ok(self.insert_declaration(sheet, &rules, property, &value, modification.position))
            }
            (Operation::Insert, None) => {
                let value = required_value(modification)?;
                self.insert_rules(sheet, &value)
            }
            (Operation::Delete, property) => Ok(self.delete(sheet, &rules, property)),
            (Operation::Replace, _) => {
                let value = required_value(modification)?;
                self.replace(sheet, &rules, &value)
            }
        }
    }

    fn serialize(&self, sheet: &Stylesheet) -> Result<String> {
        Ok(serialize_stylesheet(sheet, self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors(sheet: &Stylesheet) -> Vec<String> {
        sheet
            .children(sheet.root())
            .iter()
            .filter_map(|id| match sheet.get(*id) {
                CssNode::Rule { selector } => Some(selector.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_rules_and_declarations() {
        let sheet = parse_stylesheet(".btn { color: red; padding: 4px 8px }\nh1, h2 { margin: 0 }");
        assert_eq!(selectors(&sheet), vec![".btn", "h1, h2"]);

        let btn = sheet.children(sheet.root())[0];
        let decls: Vec<&CssNode> = sheet.children(btn).iter().map(|id| sheet.get(*id)).collect();
        assert_eq!(
            decls,
            vec![
                &CssNode::Declaration {
                    property: "color".to_string(),
                    value: "red".to_string()
                },
                &CssNode::Declaration {
                    property: "padding".to_string(),
                    value: "4px 8px".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_tolerates_stray_braces() {
        let sheet = parse_stylesheet("} a { color: red;; } } b { color: blue }");
        assert_eq!(selectors(&sheet), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_keeps_function_values() {
        let sheet = parse_stylesheet("a { background: url(img.png) no-repeat; }");
        let rule = sheet.children(sheet.root())[0];
        let decl = sheet.children(rule)[0];
        assert_eq!(
            sheet.get(decl),
            &CssNode::Declaration {
                property: "background".to_string(),
                value: "url(img.png) no-repeat".to_string()
            }
        );
    }

    #[test]
    fn test_parse_at_rules() {
        let sheet = parse_stylesheet("@import url(base.css);\n@media (max-width: 600px) { .a { color: red } }");
        let top = sheet.children(sheet.root());
        assert_eq!(
            sheet.get(top[0]),
            &CssNode::AtRule {
                name: "import".to_string(),
                params: "url(base.css)".to_string(),
                block: false
            }
        );
        assert_eq!(
            sheet.get(top[1]),
            &CssNode::AtRule {
                name: "media".to_string(),
                params: "(max-width: 600px)".to_string(),
                block: true
            }
        );
        assert_eq!(sheet.children(top[1]).len(), 1);
    }

    #[test]
    fn test_serialize_format() {
        let sheet = parse_stylesheet("/* theme */ .a{color:red}@media print{.a{display:none}}");
        let out = serialize_stylesheet(&sheet, &StylesheetOptions::default());
        assert_eq!(
            out,
            "/* theme */\n\n.a {\n  color: red;\n}\n\n@media print {\n  .a {\n    display: none;\n  }\n}\n"
        );
    }

    #[test]
    fn test_locator_descends_into_at_rules() {
        let sheet = parse_stylesheet(".a { color: red }\n@media print { .a { color: black } }");
        let found = RuleLocator.locate(&sheet, &Target::selector(".a")).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_locator_requires_selector() {
        let sheet = parse_stylesheet(".a {}");
        let err = RuleLocator.locate(&sheet, &Target::default()).unwrap_err();
        assert!(matches!(err, ModifyError::InvalidModification(_)));
    }
}
