//! Lint rules over the program snapshot
//!
//! Rules see one file at a time but can look up any other file of the
//! program, which is how `named-import-exists` checks export tables.

mod engine;
mod rules;

use std::path::Path;

use tree_sitter::Node;

use kiln_core::{Diagnostic, DiagnosticKind};

use crate::program::{Program, SourceEntry};
use crate::syntax::position;

pub use engine::LintEngine;
pub use rules::{Eqeqeq, NamedImportExists, NoDebugger, NoExplicitAny, NoVar, register_builtin_rules};

/// Default severity of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintLevel {
    Warning,
    Error,
}

impl LintLevel {
    pub fn diagnostic_kind(self) -> DiagnosticKind {
        match self {
            LintLevel::Warning => DiagnosticKind::LintWarning,
            LintLevel::Error => DiagnosticKind::LintError,
        }
    }
}

/// What a rule gets to look at.
pub struct LintContext<'a> {
    pub path: &'a Path,
    pub entry: &'a SourceEntry,
    pub program: &'a Program,
}

impl<'a> LintContext<'a> {
    /// A finding at `node`. The engine sets the final kind and rule code.
    pub fn diagnostic(&self, node: Node<'_>, message: impl Into<String>) -> Diagnostic {
        let (line, column) = position(node);
        Diagnostic::new(DiagnosticKind::LintWarning, Some(self.path), message).at(line, column)
    }

    pub fn source(&self) -> &'a [u8] {
        self.entry.text.as_bytes()
    }
}

pub trait LintRule: Send + Sync {
    /// Kebab-case rule name, also used as the diagnostic code.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn default_level(&self) -> LintLevel;

    fn check(&self, ctx: &LintContext<'_>, out: &mut Vec<Diagnostic>);
}

/// Pre-order walk; `visit` returns `false` to skip a node's children.
pub(crate) fn walk_nodes<'t, F>(node: Node<'t>, visit: &mut F)
where
    F: FnMut(Node<'t>) -> bool,
{
    if !visit(node) {
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_nodes(child, visit);
    }
}
