//! Rule registration, configuration and parallel execution

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use kiln_core::{Diagnostic, LintConfig, is_descendant};

use super::{LintContext, LintLevel, LintRule, register_builtin_rules};
use crate::program::{Program, SourceEntry};

/// Runs the registered rules over affected files.
///
/// Rules named in `allow` are skipped; rules named in `deny` report errors
/// regardless of their default level.
pub struct LintEngine {
    rules: Vec<Box<dyn LintRule>>,
    denied: HashSet<String>,
    allowed: HashSet<String>,
}

impl LintEngine {
    pub fn new(config: &LintConfig) -> Self {
        let mut engine = LintEngine {
            rules: Vec::new(),
            denied: config.deny.iter().cloned().collect(),
            allowed: config.allow.iter().cloned().collect(),
        };
        register_builtin_rules(&mut engine);
        engine
    }

    pub fn with_defaults() -> Self {
        Self::new(&LintConfig::default())
    }

    pub fn register(&mut self, rule: Box<dyn LintRule>) {
        tracing::debug!("Registered lint rule {}: {}", rule.name(), rule.description());
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Names in `allow`/`deny` that match no registered rule.
    pub fn unknown_rule_names(&self) -> Vec<String> {
        let known: HashSet<&str> = self.rule_names().into_iter().collect();
        let mut unknown: Vec<String> = self
            .allowed
            .iter()
            .chain(self.denied.iter())
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }

    fn level_for(&self, rule: &dyn LintRule) -> LintLevel {
        if self.denied.contains(rule.name()) {
            LintLevel::Error
        } else {
            rule.default_level()
        }
    }

    fn lint_file(&self, entry: &SourceEntry, program: &Program) -> Vec<Diagnostic> {
        let ctx = LintContext {
            path: &entry.path,
            entry,
            program,
        };
        let mut out = Vec::new();
        for rule in &self.rules {
            if self.allowed.contains(rule.name()) {
                continue;
            }
            let kind = self.level_for(rule.as_ref()).diagnostic_kind();
            let mut found = Vec::new();
            rule.check(&ctx, &mut found);
            out.extend(found.into_iter().map(|mut diagnostic| {
                diagnostic.kind = kind;
                diagnostic.code = Some(rule.name().to_string());
                diagnostic
            }));
        }
        out
    }

    /// Lint the affected files that belong to the package. Declarations and
    /// files with syntax errors are skipped. Output is sorted.
    pub fn lint(
        &self,
        program: &Program,
        affected: &BTreeSet<PathBuf>,
        package_root: &Path,
    ) -> Vec<Diagnostic> {
        let entries: Vec<&SourceEntry> = affected
            .iter()
            .filter(|path| is_descendant(path, package_root))
            .filter_map(|path| program.get(path))
            .filter(|entry| !entry.kind.is_declaration())
            .filter(|entry| !entry.has_parse_errors())
            .collect();

        let mut diagnostics: Vec<Diagnostic> = entries
            .par_iter()
            .flat_map_iter(|entry| self.lint_file(entry, program))
            .collect();
        diagnostics.sort();
        tracing::debug!(
            "Linted {} files, {} findings",
            entries.len(),
            diagnostics.len()
        );
        diagnostics
    }
}
