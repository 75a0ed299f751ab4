//! Script grammar (JS/TS modules with JSX).
//!
//! Location and mutation are two passes over the oxc AST: [`ScriptLocator`]
//! walks the program read-only and reports every node whose declared name
//! matches the identifier, then [`ScriptEditor`] walks it mutably and edits
//! exactly those nodes. Nodes are keyed by arena address: spans of spliced
//! values are relative to the value's own text and collide with the file's.
//!
//! Matching is a bare name comparison. Lexical scope is not consulted, so
//! a same-named local in a nested function matches too.

use oxc_allocator::{Allocator, CloneIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_ast_visit::walk_mut::{
    walk_expression, walk_for_statement, walk_jsx_element, walk_jsx_fragment, walk_statements,
    walk_variable_declaration,
};
use oxc_ast_visit::{walk, Visit, VisitMut};
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_span::{SourceType, Span, SPAN};
use std::collections::HashSet;
use tracing::debug;

use crate::error::{ModifyError, Result};
use crate::locate::Locator;
use crate::model::{Grammar, Modification, Operation, Target};
use crate::modifier::{required_value, GrammarModifier};
use crate::options::ScriptOptions;

/// Identifier that addresses the module's import list instead of a name.
pub const IMPORT_SENTINEL: &str = "import";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptNodeKind {
    Function,
    Declarator,
    Import,
    JsxElement,
}

/// Address of an arena-allocated AST node, stable while its allocator lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

impl NodeKey {
    fn of<T>(node: &T) -> Self {
        NodeKey(node as *const T as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptNodeRef {
    pub kind: ScriptNodeKind,
    pub name: String,
    pub span: Span,
    pub key: NodeKey,
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// The function a statement declares, looking through `export` and
/// `export default`.
fn declared_function<'s, 'a>(stmt: &'s Statement<'a>) -> Option<&'s Function<'a>> {
    match stmt {
        Statement::FunctionDeclaration(func) => Some(func),
        Statement::ExportNamedDeclaration(export) => match &export.declaration {
            Some(Declaration::FunctionDeclaration(func)) => Some(func),
            _ => None,
        },
        Statement::ExportDefaultDeclaration(export) => match &export.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(func) => Some(func),
            _ => None,
        },
        _ => None,
    }
}

fn function_name<'s>(func: &'s Function<'_>) -> Option<&'s str> {
    func.id.as_ref().map(|id| id.name.as_str())
}

/// The boxed binding of a plain `name = init` declarator. Its address
/// survives the declarator moving within its list.
fn declarator_binding<'s, 'a>(decl: &'s VariableDeclarator<'a>) -> Option<&'s BindingIdentifier<'a>> {
    match &decl.id {
        BindingPattern::BindingIdentifier(id) => Some(&**id),
        _ => None,
    }
}

fn declarator_key(decl: &VariableDeclarator<'_>) -> Option<NodeKey> {
    declarator_binding(decl).map(NodeKey::of)
}

fn tag_name(name: &JSXElementName<'_>) -> String {
    match name {
        JSXElementName::Identifier(id) => id.name.to_string(),
        JSXElementName::IdentifierReference(id) => id.name.to_string(),
        JSXElementName::NamespacedName(ns) => format!("{}:{}", ns.namespace.name, ns.name.name),
        JSXElementName::MemberExpression(me) => member_name(me),
        JSXElementName::ThisExpression(_) => "this".to_string(),
    }
}

fn member_name(me: &JSXMemberExpression<'_>) -> String {
    let object = match &me.object {
        JSXMemberExpressionObject::IdentifierReference(id) => id.name.to_string(),
        JSXMemberExpressionObject::MemberExpression(inner) => member_name(inner),
        _ => "this".to_string(),
    };
    format!("{}.{}", object, me.property.name)
}

fn attribute_name(name: &JSXAttributeName<'_>) -> String {
    match name {
        JSXAttributeName::Identifier(id) => id.name.to_string(),
        JSXAttributeName::NamespacedName(ns) => format!("{}:{}", ns.namespace.name, ns.name.name),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATION
// ═══════════════════════════════════════════════════════════════════════════════

struct NodeCollector<'t> {
    identifier: &'t str,
    found: Vec<ScriptNodeRef>,
}

impl NodeCollector<'_> {
    fn record<T>(&mut self, kind: ScriptNodeKind, span: Span, node: &T) {
        self.found.push(ScriptNodeRef {
            kind,
            name: self.identifier.to_string(),
            span,
            key: NodeKey::of(node),
        });
    }
}

impl<'a> Visit<'a> for NodeCollector<'_> {
    fn visit_statement(&mut self, stmt: &Statement<'a>) {
        if let Some(func) = declared_function(stmt) {
            if function_name(func) == Some(self.identifier) {
                self.record(ScriptNodeKind::Function, func.span, func);
            }
        }
        walk::walk_statement(self, stmt);
    }

    fn visit_variable_declarator(&mut self, decl: &VariableDeclarator<'a>) {
        if let Some(binding) = declarator_binding(decl) {
            if binding.name.as_str() == self.identifier {
                self.record(ScriptNodeKind::Declarator, decl.span, binding);
            }
        }
        walk::walk_variable_declarator(self, decl);
    }

    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        if self.identifier == IMPORT_SENTINEL {
            self.record(ScriptNodeKind::Import, decl.span, decl);
        }
        walk::walk_import_declaration(self, decl);
    }

    fn visit_jsx_element(&mut self, elem: &JSXElement<'a>) {
        if tag_name(&elem.opening_element.name) == self.identifier {
            self.record(ScriptNodeKind::JsxElement, elem.span, elem);
        }
        walk::walk_jsx_element(self, elem);
    }
}

/// Functions, declarators, imports and JSX elements by declared name.
pub struct ScriptLocator;

impl<'a> Locator<Program<'a>> for ScriptLocator {
    type NodeRef = ScriptNodeRef;

    fn locate(&self, program: &Program<'a>, target: &Target) -> Result<Vec<ScriptNodeRef>> {
        let identifier = target
            .identifier
            .as_deref()
            .ok_or_else(|| ModifyError::invalid("Script modifications require an identifier"))?;
        let mut collector = NodeCollector {
            identifier,
            found: Vec::new(),
        };
        collector.visit_program(program);
        Ok(collector.found)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MUTATION
// ═══════════════════════════════════════════════════════════════════════════════

fn parse_failure<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parsed replacement content, cloned into the tree once per matched node.
enum Payload<'a> {
    None,
    Expression(Expression<'a>),
    Statement(Statement<'a>),
    Attribute { name: &'a str, value: &'a str },
}

pub struct ScriptEditor<'a> {
    ast: AstBuilder<'a>,
    operation: Operation,
    functions: HashSet<NodeKey>,
    declarators: HashSet<NodeKey>,
    elements: HashSet<NodeKey>,
    payload: Payload<'a>,
    count: usize,
}

impl<'a> ScriptEditor<'a> {
    fn new(allocator: &'a Allocator, operation: Operation, refs: &[ScriptNodeRef]) -> Self {
        let keys = |kind: ScriptNodeKind| {
            refs.iter()
                .filter(|r| r.kind == kind)
                .map(|r| r.key)
                .collect::<HashSet<_>>()
        };
        Self {
            ast: AstBuilder::new(allocator),
            operation,
            functions: keys(ScriptNodeKind::Function),
            declarators: keys(ScriptNodeKind::Declarator),
            elements: keys(ScriptNodeKind::JsxElement),
            payload: Payload::None,
            count: 0,
        }
    }

    fn with_payload(mut self, payload: Payload<'a>) -> Self {
        self.payload = payload;
        self
    }

    fn rewrite_statement(&mut self, stmt: Statement<'a>) -> Option<Statement<'a>> {
        let Some(key) = declared_function(&stmt).map(NodeKey::of) else {
            return Some(stmt);
        };
        if !self.functions.contains(&key) {
            return Some(stmt);
        }
        match (self.operation, &self.payload) {
            (Operation::Delete, _) => {
                self.count += 1;
                None
            }
            (Operation::Replace, Payload::Statement(replacement)) => {
                self.count += 1;
                let replacement = replacement.clone_in(self.ast.allocator);
                Some(keep_export_wrapper(stmt, replacement))
            }
            _ => Some(stmt),
        }
    }

    fn set_attribute(&mut self, opening: &mut JSXOpeningElement<'a>) {
        let Payload::Attribute { name, value } = self.payload else {
            return;
        };
        let new_value = self.ast.jsx_attribute_value_string_literal(SPAN, value, None);
        let existing = opening.attributes.iter_mut().find_map(|item| match item {
            JSXAttributeItem::Attribute(attr) if attribute_name(&attr.name) == name => Some(attr),
            _ => None,
        });
        match existing {
            Some(attr) => attr.value = Some(new_value),
            None => {
                let attr_name = self.ast.jsx_attribute_name_identifier(SPAN, name);
                let item = self
                    .ast
                    .jsx_attribute_item_attribute(SPAN, attr_name, Some(new_value));
                opening.attributes.push(item);
            }
        }
        self.count += 1;
    }

    fn remove_children(&mut self, children: &mut ArenaVec<'a, JSXChild<'a>>) {
        if self.operation != Operation::Delete || self.elements.is_empty() {
            return;
        }
        let before = children.len();
        let elements = &self.elements;
        children.retain(|child| match child {
            JSXChild::Element(elem) => !elements.contains(&NodeKey::of(&**elem)),
            _ => true,
        });
        self.count += before - children.len();
    }
}

/// A bare function replacing an exported one inherits the export.
fn keep_export_wrapper<'a>(original: Statement<'a>, replacement: Statement<'a>) -> Statement<'a> {
    match (original, replacement) {
        (Statement::ExportNamedDeclaration(mut export), Statement::FunctionDeclaration(func)) => {
            export.declaration = Some(Declaration::FunctionDeclaration(func));
            Statement::ExportNamedDeclaration(export)
        }
        (Statement::ExportDefaultDeclaration(mut export), Statement::FunctionDeclaration(func)) => {
            export.declaration = ExportDefaultDeclarationKind::FunctionDeclaration(func);
            Statement::ExportDefaultDeclaration(export)
        }
        (_, replacement) => replacement,
    }
}

/// A declaration whose declarators were all deleted.
fn is_emptied_declaration(stmt: &Statement<'_>) -> bool {
    match stmt {
        Statement::VariableDeclaration(decl) => decl.declarations.is_empty(),
        Statement::ExportNamedDeclaration(export) => matches!(
            &export.declaration,
            Some(Declaration::VariableDeclaration(decl)) if decl.declarations.is_empty()
        ),
        _ => false,
    }
}

impl<'a> VisitMut<'a> for ScriptEditor<'a> {
    fn visit_statements(&mut self, stmts: &mut ArenaVec<'a, Statement<'a>>) {
        if !self.functions.is_empty() {
            let original = std::mem::replace(stmts, self.ast.vec());
            for stmt in original.into_iter() {
                if let Some(stmt) = self.rewrite_statement(stmt) {
                    stmts.push(stmt);
                }
            }
        }
        walk_statements(self, stmts);
        if self.operation == Operation::Delete && !self.declarators.is_empty() {
            stmts.retain(|stmt| !is_emptied_declaration(stmt));
        }
    }

    fn visit_variable_declaration(&mut self, decl: &mut VariableDeclaration<'a>) {
        match (self.operation, &self.payload) {
            (Operation::Delete, _) => {
                let before = decl.declarations.len();
                let declarators = &self.declarators;
                decl.declarations.retain(|declarator| {
                    declarator_key(declarator).map_or(true, |key| !declarators.contains(&key))
                });
                self.count += before - decl.declarations.len();
            }
            (Operation::Update, Payload::Expression(init)) => {
                for declarator in decl.declarations.iter_mut() {
                    let matched = declarator_key(declarator)
                        .is_some_and(|key| self.declarators.contains(&key));
                    if matched {
                        declarator.init = Some(init.clone_in(self.ast.allocator));
                        self.count += 1;
                    }
                }
            }
            _ => {}
        }
        walk_variable_declaration(self, decl);
    }

    fn visit_for_statement(&mut self, stmt: &mut ForStatement<'a>) {
        walk_for_statement(self, stmt);
        if matches!(&stmt.init, Some(ForStatementInit::VariableDeclaration(decl)) if decl.declarations.is_empty())
        {
            stmt.init = None;
        }
    }

    fn visit_jsx_element(&mut self, elem: &mut JSXElement<'a>) {
        if self.operation == Operation::Update && self.elements.contains(&NodeKey::of(&*elem)) {
            self.set_attribute(&mut elem.opening_element);
        }
        self.remove_children(&mut elem.children);
        walk_jsx_element(self, elem);
    }

    fn visit_jsx_fragment(&mut self, frag: &mut JSXFragment<'a>) {
        self.remove_children(&mut frag.children);
        walk_jsx_fragment(self, frag);
    }

    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        if self.operation == Operation::Delete {
            let matched = matches!(
                expr,
                Expression::JSXElement(elem) if self.elements.contains(&NodeKey::of(&**elem))
            );
            if matched {
                *expr = self.ast.expression_null_literal(SPAN);
                self.count += 1;
                return;
            }
        }
        walk_expression(self, expr);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODIFIER
// ═══════════════════════════════════════════════════════════════════════════════

/// Dialect for a path: the extension decides TypeScript and JSX; anything
/// unrecognised is parsed as a TSX module.
pub fn source_type_for(path: &str) -> SourceType {
    SourceType::from_path(path).unwrap_or_else(|_| {
        SourceType::default()
            .with_typescript(true)
            .with_jsx(true)
            .with_module(true)
    })
}

pub struct ScriptModifier<'o> {
    options: &'o ScriptOptions,
}

impl<'o> ScriptModifier<'o> {
    pub fn new(options: &'o ScriptOptions) -> Self {
        Self { options }
    }

    fn parse_statement<'a>(
        &self,
        allocator: &'a Allocator,
        source_type: SourceType,
        text: &str,
    ) -> Result<Statement<'a>> {
        let text = allocator.alloc_str(text);
        let ret = Parser::new(allocator, text, source_type).parse();
        if !ret.errors.is_empty() {
            return Err(ModifyError::parse(Grammar::Script, parse_failure(&ret.errors)));
        }
        ret.program.body.into_iter().next().ok_or_else(|| {
            ModifyError::invalid(format!("Replacement contains no statements: '{}'", text))
        })
    }

    fn parse_expression<'a>(
        &self,
        allocator: &'a Allocator,
        source_type: SourceType,
        text: &str,
    ) -> Result<Expression<'a>> {
        let text = allocator.alloc_str(text);
        Parser::new(allocator, text, source_type)
            .parse_expression()
            .map_err(|errors| ModifyError::parse(Grammar::Script, parse_failure(&errors)))
    }

    /// Insert the parsed import after the module's last import.
    fn insert_import<'a>(
        &self,
        allocator: &'a Allocator,
        program: &mut Program<'a>,
        imports: &[ScriptNodeRef],
        value: &str,
    ) -> Result<usize> {
        let Some(last) = imports.last() else {
            return Ok(0);
        };
        let statement = self.parse_statement(allocator, program.source_type, value)?;
        if !matches!(statement, Statement::ImportDeclaration(_)) {
            return Err(ModifyError::invalid(format!(
                "Expected an import declaration, got '{}'",
                value
            )));
        }
        let Some(index) = program.body.iter().position(|stmt| {
            matches!(stmt, Statement::ImportDeclaration(decl) if NodeKey::of(&**decl) == last.key)
        }) else {
            return Ok(0);
        };
        program.body.insert(index + 1, statement);
        Ok(1)
    }
}

impl GrammarModifier for ScriptModifier<'_> {
    type Arena = Allocator;
    type Tree<'a> = Program<'a>;

    fn grammar(&self) -> Grammar {
        Grammar::Script
    }

    fn parse<'a>(&self, arena: &'a Allocator, path: &str, source: &'a str) -> Result<Program<'a>> {
        let ret = Parser::new(arena, source, source_type_for(path)).parse();
        if !ret.errors.is_empty() {
            return Err(ModifyError::parse(Grammar::Script, parse_failure(&ret.errors)));
        }
        Ok(ret.program)
    }

    fn mutate<'a>(
        &self,
        arena: &'a Allocator,
        program: &mut Program<'a>,
        modification: &Modification,
    ) -> Result<usize> {
        let refs = ScriptLocator.locate(program, &modification.target)?;
        debug!(
            identifier = ?modification.target.identifier,
            matched = refs.len(),
            "located script nodes"
        );
        let has = |kind: ScriptNodeKind| refs.iter().any(|r| r.kind == kind);
        let source_type = program.source_type;

        let payload = match modification.operation {
            Operation::Insert => {
                let imports: Vec<ScriptNodeRef> = refs
                    .iter()
                    .filter(|r| r.kind == ScriptNodeKind::Import)
                    .cloned()
                    .collect();
                if imports.is_empty() {
                    return Ok(0);
                }
                let value = required_value(modification)?;
                return self.insert_import(arena, program, &imports, &value);
            }
            Operation::Delete => Payload::None,
            Operation::Replace if has(ScriptNodeKind::Function) => {
                let value = required_value(modification)?;
                Payload::Statement(self.parse_statement(arena, source_type, &value)?)
            }
            Operation::Update => match modification.target.attribute.as_deref() {
                Some(attribute) if has(ScriptNodeKind::JsxElement) => {
                    let value = required_value(modification)?;
                    Payload::Attribute {
                        name: arena.alloc_str(attribute),
                        value: arena.alloc_str(&value),
                    }
                }
                _ if has(ScriptNodeKind::Declarator) => {
                    let value = required_value(modification)?;
                    Payload::Expression(self.parse_expression(arena, source_type, &value)?)
                }
                _ => Payload::None,
            },
            _ => Payload::None,
        };

        let mut editor =
            ScriptEditor::new(arena, modification.operation, &refs).with_payload(payload);
        editor.visit_program(program);
        Ok(editor.count)
    }

    fn serialize(&self, program: &Program<'_>) -> Result<String> {
        let options = CodegenOptions {
            single_quote: self.options.single_quote,
            ..CodegenOptions::default()
        };
        Ok(Codegen::new().with_options(options).build(program).code)
    }
}
