//! Module-level syntax extraction: imports, exports and syntax errors

use std::collections::BTreeSet;

use tree_sitter::{Node, Tree};

/// How a dependency is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import ... from`, `import x = require()`
    Static,
    /// `export ... from`
    ReExport,
    /// `import("...")`
    Dynamic,
}

/// A binding imported by name from another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    /// Exported name in the target module; `default` for default imports.
    pub name: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub specifier: String,
    pub kind: ImportKind,
    pub line: u32,
    pub column: u32,
    pub names: Vec<ImportedName>,
    /// `import type` / `export type ... from`
    pub type_only: bool,
}

/// Names a module exports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTable {
    /// Runtime bindings.
    pub names: BTreeSet<String>,
    /// Interfaces, type aliases and `export type` names. These do not exist
    /// in the emitted module.
    pub types: BTreeSet<String>,
    /// `export * from` makes the table open-ended.
    pub has_star: bool,
}

impl ExportTable {
    pub fn exports(&self, name: &str) -> bool {
        self.has_star || self.names.contains(name) || self.types.contains(name)
    }

    /// A name exported only as a type.
    pub fn is_type_only(&self, name: &str) -> bool {
        self.types.contains(name) && !self.names.contains(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleSyntax {
    pub imports: Vec<ImportRecord>,
    pub exports: ExportTable,
}

/// First syntax error of a file and how many there are in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxErrorSummary {
    pub line: u32,
    pub column: u32,
    pub count: usize,
    /// Token the parser expected, for missing-node errors.
    pub expected: Option<String>,
}

impl SyntaxErrorSummary {
    pub fn message(&self) -> String {
        let head = match &self.expected {
            Some(token) => format!("syntax error: expected `{}`", token),
            None => "syntax error: unexpected token".to_string(),
        };
        if self.count > 1 {
            format!("{} ({} more syntax errors in this file)", head, self.count - 1)
        } else {
            head
        }
    }
}

/// 1-based (line, column) of a node's start.
pub fn position(node: Node<'_>) -> (u32, u32) {
    let point = node.start_position();
    (point.row as u32 + 1, point.column as u32 + 1)
}

pub(crate) fn has_child_kind(node: Node<'_>, kind: &str) -> bool {
    find_child(node, kind).is_some()
}

pub(crate) fn find_child<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

/// Text of a string literal node without its quotes.
pub fn string_value(node: Node<'_>, src: &[u8]) -> Option<String> {
    let text = node.utf8_text(src).ok()?;
    let inner = text
        .strip_prefix(['"', '\''])
        .and_then(|t| t.strip_suffix(['"', '\'']))
        .unwrap_or(text);
    Some(inner.to_string())
}

fn name_text(node: Node<'_>, src: &[u8]) -> Option<String> {
    if node.kind() == "string" {
        string_value(node, src)
    } else {
        node.utf8_text(src).ok().map(str::to_string)
    }
}

/// Collect imports and exports of a parsed module.
pub fn collect_module_syntax(tree: &Tree, source: &str) -> ModuleSyntax {
    let mut syntax = ModuleSyntax::default();
    visit(tree.root_node(), source.as_bytes(), &mut syntax);
    syntax
}

fn visit(node: Node<'_>, src: &[u8], syntax: &mut ModuleSyntax) {
    match node.kind() {
        "import_statement" => collect_import(node, src, syntax),
        "export_statement" => collect_export(node, src, syntax),
        "call_expression" => collect_dynamic_import(node, src, syntax),
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        visit(child, src, syntax);
    }
}

fn collect_import(node: Node<'_>, src: &[u8], syntax: &mut ModuleSyntax) {
    let source_node = node.child_by_field_name("source").or_else(|| {
        find_child(node, "import_require_clause").and_then(|c| c.child_by_field_name("source"))
    });
    let Some(specifier) = source_node.and_then(|s| string_value(s, src)) else {
        return;
    };

    let mut names = Vec::new();
    if let Some(clause) = find_child(node, "import_clause") {
        let mut cursor = clause.walk();
        for child in clause.named_children(&mut cursor) {
            match child.kind() {
                "identifier" => {
                    let (line, column) = position(child);
                    names.push(ImportedName {
                        name: "default".to_string(),
                        line,
                        column,
                    });
                }
                "named_imports" => {
                    let mut inner = child.walk();
                    for spec in child.named_children(&mut inner) {
                        if spec.kind() != "import_specifier" || has_child_kind(spec, "type") {
                            continue;
                        }
                        let Some(name_node) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        if let Some(name) = name_text(name_node, src) {
                            let (line, column) = position(name_node);
                            names.push(ImportedName { name, line, column });
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let (line, column) = position(node);
    syntax.imports.push(ImportRecord {
        specifier,
        kind: ImportKind::Static,
        line,
        column,
        names,
        type_only: has_child_kind(node, "type"),
    });
}

fn collect_export(node: Node<'_>, src: &[u8], syntax: &mut ModuleSyntax) {
    let is_default = has_child_kind(node, "default");
    if is_default {
        syntax.exports.names.insert("default".to_string());
    } else if let Some(declaration) = node.child_by_field_name("declaration") {
        declared_names(declaration, src, &mut syntax.exports);
    }
    let type_only = has_child_kind(node, "type");

    let mut imported = Vec::new();
    if let Some(clause) = find_child(node, "export_clause") {
        let mut cursor = clause.walk();
        for spec in clause.named_children(&mut cursor) {
            if spec.kind() != "export_specifier" {
                continue;
            }
            let name_node = spec.child_by_field_name("name");
            let exported = spec.child_by_field_name("alias").or(name_node);
            let type_spec = type_only || has_child_kind(spec, "type");
            if let Some(exported) = exported.and_then(|n| name_text(n, src)) {
                if type_spec {
                    syntax.exports.types.insert(exported);
                } else {
                    syntax.exports.names.insert(exported);
                }
            }
            if let Some(name_node) = name_node.filter(|_| !type_spec) {
                if let Some(name) = name_text(name_node, src) {
                    let (line, column) = position(name_node);
                    imported.push(ImportedName { name, line, column });
                }
            }
        }
    }

    if let Some(namespace) = find_child(node, "namespace_export") {
        let count = namespace.named_child_count();
        if let Some(alias) = count.checked_sub(1).and_then(|i| namespace.named_child(i)) {
            if let Some(name) = name_text(alias, src) {
                syntax.exports.names.insert(name);
            }
        }
    } else if has_child_kind(node, "*") {
        syntax.exports.has_star = true;
    }

    if let Some(specifier) = node
        .child_by_field_name("source")
        .and_then(|s| string_value(s, src))
    {
        let (line, column) = position(node);
        syntax.imports.push(ImportRecord {
            specifier,
            kind: ImportKind::ReExport,
            line,
            column,
            names: imported,
            type_only,
        });
    }
}

fn declared_names(declaration: Node<'_>, src: &[u8], exports: &mut ExportTable) {
    match declaration.kind() {
        "interface_declaration" | "type_alias_declaration" => {
            if let Some(name) = declaration.child_by_field_name("name") {
                if let Some(text) = name_text(name, src) {
                    exports.types.insert(text);
                }
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = declaration.walk();
            for declarator in declaration.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(name) = declarator.child_by_field_name("name") {
                    if name.kind() == "identifier" {
                        if let Ok(text) = name.utf8_text(src) {
                            exports.names.insert(text.to_string());
                        }
                    }
                }
            }
        }
        "ambient_declaration" => {
            let mut cursor = declaration.walk();
            for child in declaration.named_children(&mut cursor) {
                declared_names(child, src, exports);
            }
        }
        _ => {
            if let Some(name) = declaration.child_by_field_name("name") {
                if let Some(text) = name_text(name, src) {
                    exports.names.insert(text);
                }
            }
        }
    }
}

fn collect_dynamic_import(node: Node<'_>, src: &[u8], syntax: &mut ModuleSyntax) {
    let is_import = node
        .child_by_field_name("function")
        .is_some_and(|f| f.kind() == "import");
    if !is_import {
        return;
    }
    let Some(argument) = node
        .child_by_field_name("arguments")
        .and_then(|args| args.named_child(0))
    else {
        return;
    };
    if argument.kind() != "string" {
        return;
    }
    if let Some(specifier) = string_value(argument, src) {
        let (line, column) = position(node);
        syntax.imports.push(ImportRecord {
            specifier,
            kind: ImportKind::Dynamic,
            line,
            column,
            names: Vec::new(),
            type_only: false,
        });
    }
}

/// Summarize syntax errors; `None` for a clean tree.
pub fn syntax_errors(tree: &Tree) -> Option<SyntaxErrorSummary> {
    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }

    let mut first = None;
    let mut count = 0;
    collect_errors(root, &mut first, &mut count);

    let node = first.unwrap_or(root);
    let (line, column) = position(node);
    Some(SyntaxErrorSummary {
        line,
        column,
        count: count.max(1),
        expected: node.is_missing().then(|| node.kind().to_string()),
    })
}

fn collect_errors<'t>(node: Node<'t>, first: &mut Option<Node<'t>>, count: &mut usize) {
    if node.is_error() || node.is_missing() {
        *count += 1;
        if first.is_none() {
            *first = Some(node);
        }
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_errors(child, first, count);
    }
}
