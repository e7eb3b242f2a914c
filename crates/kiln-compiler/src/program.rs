//! Program snapshot: every source file reachable from the roots

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tree_sitter::Tree;

use kiln_core::{ContentHash, Diagnostic, SourceKind};

use crate::emit::StripResult;
use crate::resolve::Resolution;
use crate::syntax::ModuleSyntax;

/// Compiled state of one source file.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub hash: ContentHash,
    /// Bumped every time the content changes.
    pub version: u32,
    pub text: String,
    pub tree: Tree,
    pub syntax: ModuleSyntax,
    /// One entry per `syntax.imports`, same order.
    pub resolved: Vec<Resolution>,
    /// Syntax and erasability errors. Import and cycle diagnostics are
    /// produced per build.
    pub diagnostics: Vec<Diagnostic>,
    /// `None` when the file is a declaration or failed to parse cleanly.
    pub emit: Option<StripResult>,
}

impl SourceEntry {
    /// Syntax errors make the tree and the export table unreliable.
    pub fn has_parse_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Resolved program files this entry imports.
    pub fn resolved_imports(&self) -> impl Iterator<Item = &Path> {
        self.resolved.iter().filter_map(Resolution::path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    files: BTreeMap<PathBuf, SourceEntry>,
}

impl Program {
    pub fn get(&self, path: &Path) -> Option<&SourceEntry> {
        self.files.get(path)
    }

    pub(crate) fn get_mut(&mut self, path: &Path) -> Option<&mut SourceEntry> {
        self.files.get_mut(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceEntry> {
        self.files.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.keys()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub(crate) fn insert(&mut self, entry: SourceEntry) {
        self.files.insert(entry.path.clone(), entry);
    }

    pub(crate) fn remove(&mut self, path: &Path) -> Option<SourceEntry> {
        self.files.remove(path)
    }
}
