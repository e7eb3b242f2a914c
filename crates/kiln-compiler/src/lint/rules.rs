//! Built-in lint rules

use kiln_core::{Diagnostic, DiagnosticKind};

use super::{LintContext, LintEngine, LintLevel, LintRule, walk_nodes};
use crate::resolve::Resolution;

/// Registers every built-in rule with the engine.
pub fn register_builtin_rules(engine: &mut LintEngine) {
    engine.register(Box::new(NoDebugger));
    engine.register(Box::new(NoVar));
    engine.register(Box::new(Eqeqeq));
    engine.register(Box::new(NoExplicitAny));
    engine.register(Box::new(NamedImportExists));
}

/// `debugger` statements left in library code.
pub struct NoDebugger;

impl LintRule for NoDebugger {
    fn name(&self) -> &str {
        "no-debugger"
    }

    fn description(&self) -> &str {
        "disallow debugger statements"
    }

    fn default_level(&self) -> LintLevel {
        LintLevel::Error
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Vec<Diagnostic>) {
        walk_nodes(ctx.entry.tree.root_node(), &mut |node| {
            if node.kind() == "debugger_statement" {
                out.push(ctx.diagnostic(node, "unexpected `debugger` statement"));
            }
            true
        });
    }
}

/// `var` declarations; `declare var` is left alone.
pub struct NoVar;

impl LintRule for NoVar {
    fn name(&self) -> &str {
        "no-var"
    }

    fn description(&self) -> &str {
        "require let or const instead of var"
    }

    fn default_level(&self) -> LintLevel {
        LintLevel::Warning
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Vec<Diagnostic>) {
        walk_nodes(ctx.entry.tree.root_node(), &mut |node| match node.kind() {
            "ambient_declaration" => false,
            "variable_declaration" => {
                out.push(ctx.diagnostic(node, "unexpected `var`, use `let` or `const` instead"));
                true
            }
            _ => true,
        });
    }
}

/// Loose equality operators.
pub struct Eqeqeq;

impl LintRule for Eqeqeq {
    fn name(&self) -> &str {
        "eqeqeq"
    }

    fn description(&self) -> &str {
        "require === and !=="
    }

    fn default_level(&self) -> LintLevel {
        LintLevel::Warning
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Vec<Diagnostic>) {
        walk_nodes(ctx.entry.tree.root_node(), &mut |node| {
            if node.kind() == "binary_expression" {
                if let Some(operator) = node.child_by_field_name("operator") {
                    let strict = match operator.kind() {
                        "==" => Some("==="),
                        "!=" => Some("!=="),
                        _ => None,
                    };
                    if let Some(strict) = strict {
                        out.push(ctx.diagnostic(
                            operator,
                            format!("expected `{}` and saw `{}`", strict, operator.kind()),
                        ));
                    }
                }
            }
            true
        });
    }
}

/// Explicit `any` in type positions.
pub struct NoExplicitAny;

impl LintRule for NoExplicitAny {
    fn name(&self) -> &str {
        "no-explicit-any"
    }

    fn description(&self) -> &str {
        "disallow the any type"
    }

    fn default_level(&self) -> LintLevel {
        LintLevel::Warning
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Vec<Diagnostic>) {
        let src = ctx.source();
        walk_nodes(ctx.entry.tree.root_node(), &mut |node| {
            if node.kind() == "predefined_type" && node.utf8_text(src).ok() == Some("any") {
                out.push(ctx.diagnostic(node, "unexpected `any`, specify a different type"));
            }
            true
        });
    }
}

/// Named imports from relative modules must be exported by the target.
pub struct NamedImportExists;

impl LintRule for NamedImportExists {
    fn name(&self) -> &str {
        "named-import-exists"
    }

    fn description(&self) -> &str {
        "named imports must be exported by the imported module"
    }

    fn default_level(&self) -> LintLevel {
        LintLevel::Error
    }

    fn check(&self, ctx: &LintContext<'_>, out: &mut Vec<Diagnostic>) {
        let entry = ctx.entry;
        for (import, resolution) in entry.syntax.imports.iter().zip(&entry.resolved) {
            let Resolution::Resolved(target_path) = resolution else {
                continue;
            };
            let Some(target) = ctx.program.get(target_path) else {
                continue;
            };
            if target.has_parse_errors() {
                continue;
            }
            for name in &import.names {
                if target.syntax.exports.exports(&name.name) {
                    continue;
                }
                let (line, column) = (name.line, name.column);
                let message = if name.name == "default" {
                    format!("'{}' has no default export", import.specifier)
                } else {
                    format!("'{}' is not exported by '{}'", name.name, import.specifier)
                };
                out.push(
                    Diagnostic::new(DiagnosticKind::LintError, Some(ctx.path), message)
                        .at(line, column),
                );
            }
        }
    }
}
