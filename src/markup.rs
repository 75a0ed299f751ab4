//! Markup grammar.
//!
//! Input is parsed with html5ever into an `RcDom`, then imported into an
//! index arena so that splicing and removal never juggle shared handles.
//! Output goes back through html5ever's serializer, which owns escaping,
//! void elements and raw-text handling.

use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, parse_fragment, Attribute, LocalName, Namespace, QualName};
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use std::io;
use tendril::StrTendril;
use tracing::debug;

use crate::arena::{Arena, NodeId};
use crate::error::{ModifyError, Result};
use crate::locate::{Locator, SimpleSelector};
use crate::model::{Grammar, Modification, Operation, Position, Target};
use crate::modifier::{required_value, GrammarModifier};
use crate::options::MarkupOptions;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

lazy_static! {
    /// Inputs that carry their own document structure.
    static ref DOCUMENT_RE: Regex = Regex::new(r"(?i)<!doctype|<(html|head|body)[\s>]").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Document,
    Doctype {
        name: String,
    },
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

pub type MarkupTree = Arena<MarkupNode>;

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_full_document(source: &str) -> bool {
    DOCUMENT_RE.is_match(source)
}

/// Parse a whole file. Sources without a doctype or an `<html>`, `<head>` or
/// `<body>` tag are parsed as a body fragment so no implied wrappers show up
/// in the output.
pub fn parse_markup(source: &str, options: &MarkupOptions) -> Result<MarkupTree> {
    let mut tree = MarkupTree::with_root(MarkupNode::Document);
    let root = tree.root();

    // Dropping an RcDom empties every node below it, so `dom` must outlive
    // the import.
    let document = options.preserve_document && is_full_document(source);
    let dom = if document {
        parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut source.as_bytes())
            .map_err(|e| ModifyError::parse(Grammar::Markup, e.to_string()))?
    } else {
        parse_fragment_dom(source)?
    };
    let top_level: Vec<Handle> = if document {
        dom.document.children.borrow().clone()
    } else {
        fragment_roots(&dom)
    };

    for handle in &top_level {
        let id = import_node(&mut tree, handle);
        tree.append_child(root, id);
    }
    Ok(tree)
}

fn body_context() -> QualName {
    QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body"))
}

fn parse_fragment_dom(text: &str) -> Result<RcDom> {
    parse_fragment(RcDom::default(), Default::default(), body_context(), vec![])
        .from_utf8()
        .read_from(&mut text.as_bytes())
        .map_err(|e| ModifyError::parse(Grammar::Markup, e.to_string()))
}

/// Fragment content lives under the synthetic `<html>` element html5ever
/// creates as the document's only child.
fn fragment_roots(dom: &RcDom) -> Vec<Handle> {
    let html = dom.document.children.borrow().first().cloned();
    let roots = match html {
        Some(html) => html.children.borrow().clone(),
        None => Vec::new(),
    };
    roots
}

/// Copy an rcdom subtree into the arena; the returned node is detached.
fn import_node(tree: &mut MarkupTree, handle: &Handle) -> NodeId {
    let node = match &handle.data {
        NodeData::Document => MarkupNode::Document,
        NodeData::Doctype { name, .. } => MarkupNode::Doctype {
            name: name.to_string(),
        },
        NodeData::Text { contents } => MarkupNode::Text(contents.borrow().to_string()),
        NodeData::Comment { contents } => MarkupNode::Comment(contents.to_string()),
        NodeData::Element { name, attrs, .. } => MarkupNode::Element {
            name: name.clone(),
            attrs: attrs.borrow().clone(),
        },
        NodeData::ProcessingInstruction { target, contents } => {
            MarkupNode::ProcessingInstruction {
                target: target.to_string(),
                data: contents.to_string(),
            }
        }
    };
    let id = tree.alloc(node);

    // <template> keeps its children in a separate content fragment.
    let template = match &handle.data {
        NodeData::Element {
            template_contents, ..
        } => template_contents.borrow().clone(),
        _ => None,
    };
    let source = template.as_ref().unwrap_or(handle);
    for child in source.children.borrow().iter() {
        let child_id = import_node(tree, child);
        tree.append_child(id, child_id);
    }
    id
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

struct SerializableNode<'t> {
    tree: &'t MarkupTree,
    id: NodeId,
}

impl SerializableNode<'_> {
    fn write<S: Serializer>(&self, id: NodeId, serializer: &mut S) -> io::Result<()> {
        match self.tree.get(id) {
            MarkupNode::Document => self.write_children(id, serializer),
            MarkupNode::Doctype { name } => serializer.write_doctype(name),
            MarkupNode::Text(text) => serializer.write_text(text),
            MarkupNode::Comment(text) => serializer.write_comment(text),
            MarkupNode::ProcessingInstruction { target, data } => {
                serializer.write_processing_instruction(target, data)
            }
            MarkupNode::Element { name, attrs } => {
                serializer.start_elem(
                    name.clone(),
                    attrs.iter().map(|attr| (&attr.name, &*attr.value)),
                )?;
                self.write_children(id, serializer)?;
                serializer.end_elem(name.clone())
            }
        }
    }

    fn write_children<S: Serializer>(&self, id: NodeId, serializer: &mut S) -> io::Result<()> {
        for child in self.tree.children(id) {
            self.write(*child, serializer)?;
        }
        Ok(())
    }
}

impl Serialize for SerializableNode<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        match traversal_scope {
            TraversalScope::IncludeNode => self.write(self.id, serializer),
            TraversalScope::ChildrenOnly(_) => self.write_children(self.id, serializer),
        }
    }
}

pub fn serialize_markup(tree: &MarkupTree) -> Result<String> {
    let mut bytes = Vec::new();
    let node = SerializableNode {
        tree,
        id: tree.root(),
    };
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    serialize(&mut bytes, &node, opts)?;
    Ok(String::from_utf8(bytes)?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATION
// ═══════════════════════════════════════════════════════════════════════════════

fn attribute_named(attr: &Attribute, name: &str) -> bool {
    let local: &str = &attr.name.local;
    local.eq_ignore_ascii_case(name)
}

fn attribute_value<'t>(attrs: &'t [Attribute], name: &str) -> Option<&'t str> {
    attrs
        .iter()
        .find(|attr| attribute_named(attr, name))
        .map(|attr| &*attr.value)
}

/// Tag, `.class` and `#id` matching over every attached element.
pub struct ElementLocator;

impl Locator<MarkupTree> for ElementLocator {
    type NodeRef = NodeId;

    fn locate(&self, tree: &MarkupTree, target: &Target) -> Result<Vec<NodeId>> {
        let selector = target
            .selector
            .as_deref()
            .ok_or_else(|| ModifyError::invalid("Markup modifications require a selector"))?;
        let selector = SimpleSelector::parse(selector)?;

        Ok(tree
            .descendants(tree.root())
            .into_iter()
            .filter(|id| match tree.get(*id) {
                MarkupNode::Element { name, attrs } => {
                    selector.matches(&name.local, |attr| attribute_value(attrs, attr))
                }
                _ => false,
            })
            .collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MUTATION
// ═══════════════════════════════════════════════════════════════════════════════

fn set_attribute(tree: &mut MarkupTree, id: NodeId, name: &str, value: &str) -> bool {
    let MarkupNode::Element { attrs, .. } = tree.get_mut(id) else {
        return false;
    };
    match attrs
        .iter_mut()
        .find(|attr| attribute_named(attr, name))
    {
        Some(attr) => attr.value = StrTendril::from(value),
        None => attrs.push(Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
            value: StrTendril::from(value),
        }),
    }
    true
}

fn remove_attribute(tree: &mut MarkupTree, id: NodeId, name: &str) -> bool {
    let MarkupNode::Element { attrs, .. } = tree.get_mut(id) else {
        return false;
    };
    let before = attrs.len();
    attrs.retain(|attr| !attribute_named(attr, name));
    attrs.len() != before
}

/// Drop every child and leave a single text node holding `text`.
fn replace_children_with_text(tree: &mut MarkupTree, id: NodeId, text: &str) {
    tree.clear_children(id);
    let text_id = tree.alloc(MarkupNode::Text(text.to_string()));
    tree.append_child(id, text_id);
}

/// Splice `nodes` relative to `anchor`. Returns false when the placement
/// needs a parent and `anchor` has none.
fn splice(tree: &mut MarkupTree, anchor: NodeId, nodes: &[NodeId], position: Position) -> bool {
    match position {
        Position::Before | Position::After => {
            let (Some(parent), Some(index)) = (tree.parent(anchor), tree.index_in_parent(anchor))
            else {
                return false;
            };
            let start = if position == Position::Before { index } else { index + 1 };
            for (offset, node) in nodes.iter().enumerate() {
                tree.insert_child(parent, start + offset, *node);
            }
        }
        Position::Inside => {
            for node in nodes {
                tree.append_child(anchor, *node);
            }
        }
        Position::Prepend => {
            for (offset, node) in nodes.iter().enumerate() {
                tree.insert_child(anchor, offset, *node);
            }
        }
    }
    true
}

pub struct MarkupModifier<'o> {
    options: &'o MarkupOptions,
}

impl<'o> MarkupModifier<'o> {
    pub fn new(options: &'o MarkupOptions) -> Self {
        Self { options }
    }

    /// Parse the fragment once; every matched element gets its own copy.
    fn insert(
        &self,
        tree: &mut MarkupTree,
        elements: &[NodeId],
        fragment: &str,
        position: Position,
    ) -> Result<usize> {
        let dom = parse_fragment_dom(fragment)?;
        let roots = fragment_roots(&dom);
        if roots.is_empty() {
            return Err(ModifyError::parse(
                Grammar::Markup,
                format!("inserted markup contains no nodes: '{}'", fragment),
            ));
        }

        let mut count = 0;
        for element in elements {
            let nodes: Vec<NodeId> = roots.iter().map(|root| import_node(tree, root)).collect();
            if splice(tree, *element, &nodes, position) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Swap each element for the fragment's top-level nodes.
    fn replace(&self, tree: &mut MarkupTree, elements: &[NodeId], fragment: &str) -> Result<usize> {
        let dom = parse_fragment_dom(fragment)?;
        let roots = fragment_roots(&dom);

        let mut count = 0;
        for element in elements {
            let nodes: Vec<NodeId> = roots.iter().map(|root| import_node(tree, root)).collect();
            if splice(tree, *element, &nodes, Position::Before) {
                tree.detach(*element);
                count += 1;
            }
        }
        Ok(count)
    }
}

impl GrammarModifier for MarkupModifier<'_> {
    type Arena = ();
    type Tree<'a> = MarkupTree;

    fn grammar(&self) -> Grammar {
        Grammar::Markup
    }

    fn parse<'a>(&self, _arena: &'a (), _path: &str, source: &'a str) -> Result<MarkupTree> {
        parse_markup(source, self.options)
    }

    fn mutate<'a>(
        &self,
        _arena: &'a (),
        tree: &mut MarkupTree,
        modification: &Modification,
    ) -> Result<usize> {
        let target = &modification.target;
        let attribute = target.attribute.as_deref();
        let elements = ElementLocator.locate(tree, target)?;
        debug!(selector = ?target.selector, matched = elements.len(), "located markup elements");

        match (modification.operation, attribute) {
            (Operation::Update, Some(attribute)) => {
                let value = required_value(modification)?;
                Ok(elements
                    .iter()
                    .filter(|id| set_attribute(tree, **id, attribute, &value))
                    .count())
            }
            (Operation::Update, None) => {
                let value = required_value(modification)?;
                let mut count = 0;
                for id in &elements {
                    // Nested matches vanish with their ancestor's children.
                    if tree.is_attached(*id) {
                        replace_children_with_text(tree, *id, &value);
                        count += 1;
                    }
                }
                Ok(count)
            }
            (Operation::Delete, Some(attribute)) => Ok(elements
                .iter()
                .filter(|id| remove_attribute(tree, **id, attribute))
                .count()),
            (Operation::Delete, None) => {
                let mut count = 0;
                for id in &elements {
                    if tree.is_attached(*id) {
                        tree.detach(*id);
                        count += 1;
                    }
                }
                Ok(count)
            }
            (Operation::Insert, _) => {
                let value = required_value(modification)?;
                let position = modification.position.unwrap_or(Position::Inside);
                self.insert(tree, &elements, &value, position)
            }
            (Operation::Replace, _) => {
                let value = required_value(modification)?;
                self.replace(tree, &elements, &value)
            }
        }
    }

    fn serialize(&self, tree: &MarkupTree) -> Result<String> {
        serialize_markup(tree)
    }
}
