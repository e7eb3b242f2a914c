//! Root file discovery

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use kiln_core::{BuildConfig, is_descendant, is_source_file, relative_path, to_posix};

use crate::CompileError;

/// Files found under the configured roots.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: BTreeSet<PathBuf>,
    /// Configured roots that do not exist.
    pub missing_roots: Vec<PathBuf>,
}

/// Walks the source roots, honoring ignore files and include/exclude globs.
#[derive(Debug, Clone)]
pub struct SourceScanner {
    package_root: PathBuf,
    roots: Vec<PathBuf>,
    out_root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
}

fn build_globs(patterns: &[String]) -> Result<GlobSet, CompileError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| CompileError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| CompileError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

impl SourceScanner {
    pub fn new(config: &BuildConfig) -> Result<Self, CompileError> {
        Ok(SourceScanner {
            package_root: config.package_root.clone(),
            roots: config.root_paths(),
            out_root: config.out_root(),
            include: build_globs(&config.include)?,
            exclude: build_globs(&config.exclude)?,
        })
    }

    /// Whether a path would be picked up as a root file.
    pub fn is_root_file(&self, path: &Path) -> bool {
        if !is_source_file(path) || is_descendant(path, &self.out_root) {
            return false;
        }
        if !self.roots.iter().any(|root| is_descendant(path, root)) {
            return false;
        }
        let relative = to_posix(&relative_path(path, &self.package_root));
        self.include.is_match(&relative) && !self.exclude.is_match(&relative)
    }

    pub fn scan(&self) -> Result<ScanResult, CompileError> {
        let mut result = ScanResult::default();

        let existing: Vec<&PathBuf> = self
            .roots
            .iter()
            .filter(|root| {
                let exists = root.is_dir();
                if !exists {
                    tracing::warn!("Source root {} does not exist", root.display());
                    result.missing_roots.push((*root).clone());
                }
                exists
            })
            .collect();

        let Some((first, rest)) = existing.split_first() else {
            return Ok(result);
        };

        let mut builder = WalkBuilder::new(first);
        for root in rest {
            builder.add(root);
        }
        let out_root = self.out_root.clone();
        builder
            .require_git(false)
            .filter_entry(move |entry| {
                let path = entry.path();
                path.file_name().is_none_or(|name| name != "node_modules")
                    && !path.starts_with(&out_root)
            });

        for entry in builder.build() {
            let entry = entry?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = kiln_core::normalize(entry.path());
            if self.is_root_file(&path) {
                result.files.insert(path);
            }
        }

        tracing::debug!("Scanned {} root files", result.files.len());
        Ok(result)
    }
}
