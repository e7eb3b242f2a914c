//! Incremental compiler session
//!
//! The session owns the program snapshot and the dependency graph between
//! builds. Each build walks the program from the scanned roots, re-reads
//! only dirty or unknown files, re-resolves every import, and reports the
//! affected closure: changed files plus everything that transitively
//! imports a changed or removed file.
//!
//! Recompiled entries and new resolutions are staged during the walk and
//! applied only once every file was read, so a failed build leaves the
//! session exactly as the previous successful build left it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use thiserror::Error;

use kiln_core::{
    BuildConfig, ContentHash, DependencyGraph, Diagnostic, DirtySet, EmittedArtifact, SourceKind,
    relative_path, to_posix,
};

use crate::emit::strip_types;
use crate::parser::SourceParser;
use crate::program::{Program, SourceEntry};
use crate::resolve::{Resolution, resolve_specifier};
use crate::scan::SourceScanner;
use crate::syntax::{ImportKind, collect_module_syntax, syntax_errors};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid glob pattern `{pattern}`: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("failed to walk source roots: {0}")]
    Walk(#[from] ignore::Error),
    #[error("parser error: {0}")]
    Parser(String),
}

/// Result of one build.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    /// Files whose output may differ from the previous build.
    pub affected: BTreeSet<PathBuf>,
    /// Files that left the program.
    pub removed: BTreeSet<PathBuf>,
    /// Every file of the current program.
    pub watch_files: BTreeSet<PathBuf>,
    pub artifacts: Vec<EmittedArtifact>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A compiler session driven by the orchestrator.
pub trait Compiler: Send + 'static {
    fn build(&mut self, request: &DirtySet) -> Result<CompileOutput, CompileError>;

    fn program(&self) -> &Program;
}

/// Output path of `source` relative to the output root.
/// `None` for declaration files.
pub fn output_path_for(root_dir: &Path, source: &Path) -> Option<PathBuf> {
    let extension = SourceKind::from_path(source)?.output_extension()?;
    Some(relative_path(source, root_dir).with_extension(extension))
}

enum Refresh {
    Unchanged,
    Changed(Box<SourceEntry>),
    Missing,
}

pub struct IncrementalCompiler {
    config: BuildConfig,
    scanner: SourceScanner,
    parser: SourceParser,
    program: Program,
    graph: DependencyGraph,
    builds: u64,
}

impl IncrementalCompiler {
    pub fn new(config: &BuildConfig) -> Result<Self, CompileError> {
        Ok(IncrementalCompiler {
            config: config.clone(),
            scanner: SourceScanner::new(config)?,
            parser: SourceParser::new(),
            program: Program::default(),
            graph: DependencyGraph::new(),
            builds: 0,
        })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Re-read a file if it is dirty or unknown. The program is not touched.
    fn refresh(&mut self, path: &Path, request: &DirtySet) -> Result<Refresh, CompileError> {
        let previous = self.program.get(path);
        if previous.is_some() && !request.contains(path) {
            return Ok(Refresh::Unchanged);
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Refresh::Missing),
            Err(source) => {
                return Err(CompileError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let hash = ContentHash::of(&bytes);
        let version = match previous {
            Some(entry) if entry.hash == hash => {
                if !request.is_forced(path) {
                    return Ok(Refresh::Unchanged);
                }
                entry.version
            }
            Some(entry) => entry.version + 1,
            None => 1,
        };

        let text = String::from_utf8_lossy(&bytes).into_owned();
        let entry = self.compile_file(path, text, hash, version)?;
        Ok(Refresh::Changed(Box::new(entry)))
    }

    fn compile_file(
        &mut self,
        path: &Path,
        text: String,
        hash: ContentHash,
        version: u32,
    ) -> Result<SourceEntry, CompileError> {
        let kind = SourceKind::from_path(path).unwrap_or(SourceKind::TypeScript);
        let tree = self.parser.parse(kind, &text)?;
        let syntax = collect_module_syntax(&tree, &text);

        let mut diagnostics = Vec::new();
        let emit = if let Some(summary) = syntax_errors(&tree) {
            diagnostics.push(
                Diagnostic::build_error(path, summary.message()).at(summary.line, summary.column),
            );
            None
        } else if kind.is_declaration() {
            None
        } else {
            Some(strip_types(&tree, &text, path))
        };

        tracing::debug!("Compiled {} (v{})", path.display(), version);
        Ok(SourceEntry {
            path: path.to_path_buf(),
            kind,
            hash,
            version,
            text,
            tree,
            syntax,
            resolved: Vec::new(),
            diagnostics,
            emit,
        })
    }

    fn display_path(&self, path: &Path) -> String {
        to_posix(&relative_path(path, &self.config.package_root))
    }

    fn cycle_warnings(&self, affected: &BTreeSet<PathBuf>) -> Vec<Diagnostic> {
        let mut warnings = Vec::new();
        for cycle in self.graph.import_cycles() {
            let Some(first) = cycle.iter().find(|p| affected.contains(*p)) else {
                continue;
            };
            let members: Vec<String> = cycle.iter().map(|p| self.display_path(p)).collect();
            warnings.push(Diagnostic::build_warning(
                first,
                format!("import cycle between {}", members.join(", ")),
            ));
        }
        warnings
    }

    /// Diagnostics and, when the file is clean, the artifact of one
    /// affected file.
    fn finish_file(
        &self,
        entry: &SourceEntry,
        diagnostics: &mut Vec<Diagnostic>,
        artifacts: &mut Vec<EmittedArtifact>,
    ) {
        let start = diagnostics.len();
        diagnostics.extend(entry.diagnostics.iter().cloned());
        if let Some(emit) = &entry.emit {
            diagnostics.extend(emit.diagnostics.iter().cloned());
        }
        for (import, resolution) in entry.syntax.imports.iter().zip(&entry.resolved) {
            match resolution {
                Resolution::Unresolved => diagnostics.push(
                    Diagnostic::build_error(
                        &entry.path,
                        format!("cannot resolve module '{}'", import.specifier),
                    )
                    .at(import.line, import.column),
                ),
                Resolution::Resolved(target) if !import.type_only => {
                    let Some(target) = self.program.get(target) else {
                        continue;
                    };
                    let keyword = match import.kind {
                        ImportKind::ReExport => "export type",
                        _ => "import type",
                    };
                    for name in &import.names {
                        if target.syntax.exports.is_type_only(&name.name) {
                            diagnostics.push(
                                Diagnostic::build_error(
                                    &entry.path,
                                    format!(
                                        "'{}' is a type and must be imported with `{}`",
                                        name.name, keyword
                                    ),
                                )
                                .at(name.line, name.column),
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        if diagnostics[start..].iter().any(Diagnostic::is_error) {
            return;
        }
        let Some(emit) = &entry.emit else {
            return;
        };
        if let Some(out_rel_path) = output_path_for(&self.config.root_dir_path(), &entry.path) {
            artifacts.push(EmittedArtifact {
                source: entry.path.clone(),
                out_rel_path,
                text: emit.text.clone(),
            });
        }
    }
}

impl Compiler for IncrementalCompiler {
    fn build(&mut self, request: &DirtySet) -> Result<CompileOutput, CompileError> {
        self.builds += 1;
        let scan = self.scanner.scan()?;

        let mut diagnostics: Vec<Diagnostic> = scan
            .missing_roots
            .iter()
            .map(|root| Diagnostic::build_warning(root, "source root does not exist"))
            .collect();

        let mut changed = BTreeSet::new();
        let mut present = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<PathBuf> = scan.files.into_iter().collect();

        let mut staged: BTreeMap<PathBuf, SourceEntry> = BTreeMap::new();
        let mut resolutions: BTreeMap<PathBuf, Vec<Resolution>> = BTreeMap::new();

        while let Some(path) = queue.pop_front() {
            if !visited.insert(path.clone()) {
                continue;
            }
            let fresh = match self.refresh(&path, request)? {
                Refresh::Missing => continue,
                Refresh::Changed(entry) => Some(*entry),
                Refresh::Unchanged => None,
            };
            present.insert(path.clone());

            let resolved = {
                let Some(entry) = fresh.as_ref().or_else(|| self.program.get(&path)) else {
                    continue;
                };
                let resolved: Vec<Resolution> = entry
                    .syntax
                    .imports
                    .iter()
                    .map(|import| resolve_specifier(&path, &import.specifier))
                    .collect();
                if fresh.is_none() && resolved != entry.resolved {
                    changed.insert(path.clone());
                    resolutions.insert(path.clone(), resolved.clone());
                }
                resolved
            };
            for dependency in resolved.iter().filter_map(Resolution::path) {
                if !visited.contains(dependency) {
                    queue.push_back(dependency.to_path_buf());
                }
            }
            if let Some(mut entry) = fresh {
                entry.resolved = resolved;
                changed.insert(path.clone());
                staged.insert(path, entry);
            }
        }

        // every file was read; commit
        for (path, resolved) in resolutions {
            if let Some(entry) = self.program.get_mut(&path) {
                entry.resolved = resolved;
            }
        }
        for entry in staged.into_values() {
            self.program.insert(entry);
        }

        let removed: BTreeSet<PathBuf> = self
            .program
            .paths()
            .filter(|path| !present.contains(*path))
            .cloned()
            .collect();

        for path in &changed {
            let imports: Vec<PathBuf> = self
                .program
                .get(path)
                .map(|entry| entry.resolved_imports().map(Path::to_path_buf).collect())
                .unwrap_or_default();
            self.graph.set_imports(path, imports);
        }

        let seeds: BTreeSet<PathBuf> = changed.union(&removed).cloned().collect();
        let mut affected = self.graph.transitive_dependents(&seeds);
        affected.extend(changed.iter().cloned());
        affected.retain(|path| present.contains(path));

        for path in &removed {
            self.graph.remove_file(path);
            self.program.remove(path);
            tracing::debug!("Removed {} from the program", path.display());
        }

        let mut artifacts = Vec::new();
        for path in &affected {
            if let Some(entry) = self.program.get(path) {
                self.finish_file(entry, &mut diagnostics, &mut artifacts);
            }
        }
        diagnostics.extend(self.cycle_warnings(&affected));
        diagnostics.sort();

        tracing::info!(
            "Build {}: {} files, {} affected, {} removed, {} artifacts",
            self.builds,
            present.len(),
            affected.len(),
            removed.len(),
            artifacts.len()
        );

        Ok(CompileOutput {
            affected,
            removed,
            watch_files: present,
            artifacts,
            diagnostics,
        })
    }

    fn program(&self) -> &Program {
        &self.program
    }
}
