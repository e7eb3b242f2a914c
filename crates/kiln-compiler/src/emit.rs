//! Type-stripping emit
//!
//! TypeScript-only syntax is blanked out with spaces so every remaining
//! token keeps its line and column. Newlines inside erased ranges are kept.
//! Constructs that would need code generation are reported as build errors
//! and the file is not emitted.

use std::ops::Range;
use std::path::Path;

use tree_sitter::{Node, Tree};

use kiln_core::Diagnostic;

use crate::resolve::rewrite_specifier_extension;
use crate::syntax::{find_child, has_child_kind, position};

/// JavaScript text of one file plus the reasons it cannot be emitted.
#[derive(Debug, Clone, Default)]
pub struct StripResult {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl StripResult {
    pub fn is_emittable(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Node kinds removed entirely.
const ERASED_NODES: &[&str] = &[
    "type_annotation",
    "asserts_annotation",
    "type_predicate_annotation",
    "interface_declaration",
    "type_alias_declaration",
    "ambient_declaration",
    "function_signature",
    "method_signature",
    "abstract_method_signature",
    "index_signature",
    "type_parameters",
    "type_arguments",
    "accessibility_modifier",
    "override_modifier",
    "implements_clause",
];

/// Declarations that make a whole `export` statement type-only.
const ERASED_DECLARATIONS: &[&str] = &[
    "interface_declaration",
    "type_alias_declaration",
    "ambient_declaration",
    "function_signature",
];

/// Strip types from a parsed file. The tree must be free of syntax errors.
pub fn strip_types(tree: &Tree, source: &str, path: &Path) -> StripResult {
    let mut stripper = Stripper {
        src: source.as_bytes(),
        path,
        erased: Vec::new(),
        rewrites: Vec::new(),
        diagnostics: Vec::new(),
    };
    stripper.visit(tree.root_node());
    stripper.finish()
}

fn is_class_member(node: Node<'_>) -> bool {
    node.parent().is_some_and(|p| p.kind() == "class_body")
}

struct Stripper<'a> {
    src: &'a [u8],
    path: &'a Path,
    erased: Vec<Range<usize>>,
    rewrites: Vec<(Range<usize>, String)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Stripper<'a> {
    fn erase(&mut self, node: Node<'_>) {
        self.erased.push(node.start_byte()..node.end_byte());
    }

    /// Erase a list element together with the comma that follows it.
    fn erase_with_comma(&mut self, node: Node<'_>) {
        let end = match node.next_sibling() {
            Some(next) if next.kind() == "," => next.end_byte(),
            _ => node.end_byte(),
        };
        self.erased.push(node.start_byte()..end);
    }

    /// Erase a class member with its terminating semicolon.
    fn erase_member(&mut self, node: Node<'_>) {
        let end = match node.next_sibling() {
            Some(next) if next.kind() == ";" => next.end_byte(),
            _ => node.end_byte(),
        };
        self.erased.push(node.start_byte()..end);
    }

    fn erase_child_tokens(&mut self, node: Node<'_>, tokens: &[&str]) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if !child.is_named() && tokens.contains(&child.kind()) {
                self.erased.push(child.start_byte()..child.end_byte());
            }
        }
    }

    fn unsupported(&mut self, node: Node<'_>, what: &str) {
        let (line, column) = position(node);
        self.diagnostics.push(
            Diagnostic::build_error(self.path, format!("{} are not erasable syntax", what))
                .at(line, column),
        );
    }

    fn rewrite_string(&mut self, node: Node<'_>) {
        if node.kind() != "string" || node.end_byte() - node.start_byte() < 2 {
            return;
        }
        let inner = node.start_byte() + 1..node.end_byte() - 1;
        let Ok(specifier) = std::str::from_utf8(&self.src[inner.clone()]) else {
            return;
        };
        if let Some(rewritten) = rewrite_specifier_extension(specifier) {
            self.rewrites.push((inner, rewritten));
        }
    }

    fn visit_children(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node<'_>) {
        let kind = node.kind();
        if ERASED_NODES.contains(&kind) {
            if is_class_member(node) {
                self.erase_member(node);
            } else {
                self.erase(node);
            }
            return;
        }

        match kind {
            "import_statement" => self.visit_import(node),
            "export_statement" => self.visit_export(node),
            "import_alias" => self.unsupported(node, "import aliases"),
            "enum_declaration" => self.unsupported(node, "enums"),
            "internal_module" | "module" => self.unsupported(node, "namespaces"),
            "as_expression" | "satisfies_expression" => {
                let keyword = if kind == "as_expression" { "as" } else { "satisfies" };
                if let Some(token) = find_child(node, keyword) {
                    self.erased.push(token.start_byte()..node.end_byte());
                }
                if let Some(expression) = node.named_child(0) {
                    self.visit(expression);
                }
            }
            "non_null_expression" => {
                self.erase_child_tokens(node, &["!"]);
                self.visit_children(node);
            }
            "required_parameter" | "optional_parameter" => self.visit_parameter(node),
            "arrow_function" => self.visit_arrow(node),
            "public_field_definition" => {
                if has_child_kind(node, "declare") || has_child_kind(node, "abstract") {
                    self.erase_member(node);
                    return;
                }
                self.erase_child_tokens(node, &["readonly", "?", "!"]);
                self.visit_children(node);
            }
            "method_definition" => {
                self.erase_child_tokens(node, &["?"]);
                self.visit_children(node);
            }
            "variable_declarator" => {
                self.erase_child_tokens(node, &["!"]);
                self.visit_children(node);
            }
            "abstract_class_declaration" => {
                self.erase_child_tokens(node, &["abstract"]);
                self.visit_children(node);
            }
            "call_expression" => {
                let is_import = node
                    .child_by_field_name("function")
                    .is_some_and(|f| f.kind() == "import");
                if is_import {
                    if let Some(argument) = node
                        .child_by_field_name("arguments")
                        .and_then(|args| args.named_child(0))
                    {
                        self.rewrite_string(argument);
                    }
                }
                self.visit_children(node);
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_import(&mut self, node: Node<'_>) {
        if has_child_kind(node, "type") {
            self.erase(node);
            return;
        }
        if has_child_kind(node, "import_require_clause") {
            self.unsupported(node, "`import = require()` declarations");
            return;
        }

        if let Some(named) =
            find_child(node, "import_clause").and_then(|c| find_child(c, "named_imports"))
        {
            let mut cursor = named.walk();
            for spec in named.named_children(&mut cursor) {
                if spec.kind() == "import_specifier" && has_child_kind(spec, "type") {
                    self.erase_with_comma(spec);
                }
            }
        }
        if let Some(source) = node.child_by_field_name("source") {
            self.rewrite_string(source);
        }
    }

    fn visit_export(&mut self, node: Node<'_>) {
        if has_child_kind(node, "type") {
            self.erase(node);
            return;
        }
        if has_child_kind(node, "=") {
            self.unsupported(node, "`export =` assignments");
            return;
        }
        if let Some(declaration) = node.child_by_field_name("declaration") {
            if ERASED_DECLARATIONS.contains(&declaration.kind()) {
                self.erase(node);
                return;
            }
        }

        if let Some(clause) = find_child(node, "export_clause") {
            let mut cursor = clause.walk();
            for spec in clause.named_children(&mut cursor) {
                if spec.kind() == "export_specifier" && has_child_kind(spec, "type") {
                    self.erase_with_comma(spec);
                }
            }
        }
        if let Some(source) = node.child_by_field_name("source") {
            self.rewrite_string(source);
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if !matches!(child.kind(), "export_clause" | "string") {
                self.visit(child);
            }
        }
    }

    /// A return type alone on its line would leave a line break before
    /// `=>`; the arrow moves up behind the parameter list.
    fn visit_arrow(&mut self, node: Node<'_>) {
        let parameters = node.child_by_field_name("parameters");
        let arrow = find_child(node, "=>");
        if let (Some(parameters), Some(arrow), Some(_)) =
            (parameters, arrow, node.child_by_field_name("return_type"))
        {
            let gap = &self.src[parameters.end_byte()..arrow.start_byte()];
            if gap.contains(&b'\n') {
                let at = parameters.end_byte();
                self.rewrites.push((at..at, "=>".to_string()));
                self.erased.push(arrow.start_byte()..arrow.end_byte());
            }
        }
        self.visit_children(node);
    }

    fn visit_parameter(&mut self, node: Node<'_>) {
        if has_child_kind(node, "accessibility_modifier")
            || has_child_kind(node, "override_modifier")
            || has_child_kind(node, "readonly")
        {
            self.unsupported(node, "parameter properties");
            return;
        }

        // `this` parameters only exist for the checker.
        let is_this = node
            .child_by_field_name("pattern")
            .is_some_and(|p| p.kind() == "this");
        if is_this {
            self.erase_with_comma(node);
            return;
        }

        self.erase_child_tokens(node, &["?"]);
        self.visit_children(node);
    }

    fn finish(mut self) -> StripResult {
        let mut bytes = self.src.to_vec();
        for range in &self.erased {
            for byte in &mut bytes[range.clone()] {
                if *byte != b'\n' && *byte != b'\r' {
                    *byte = b' ';
                }
            }
        }

        self.rewrites.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));
        for (range, replacement) in self.rewrites {
            bytes.splice(range, replacement.into_bytes());
        }

        self.diagnostics.sort();
        StripResult {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            diagnostics: self.diagnostics,
        }
    }
}
