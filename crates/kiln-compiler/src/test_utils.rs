//! Test fixtures for kiln-compiler

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use kiln_core::{BuildConfig, DirtySet};

use crate::{CompileOutput, Compiler, IncrementalCompiler};

/// Write a file below `root`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Create a temporary package with the given files.
pub fn create_package(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (relative, content) in files {
        write_file(temp_dir.path(), relative, content);
    }
    temp_dir
}

/// `a.ts` imports `b.ts`; `c.ts` stands alone.
pub fn create_abc_package() -> TempDir {
    create_package(&[
        (
            "src/a.ts",
            r#"import { greet } from './b';

export function main(name: string): string {
    return greet(name);
}
"#,
        ),
        (
            "src/b.ts",
            r#"export function greet(name: string): string {
    return `hello ${name}`;
}
"#,
        ),
        ("src/c.ts", "export const c: number = 3;\n"),
    ])
}

/// Canonical path of `src/<name>`, as the compiler reports it.
pub fn src_path(package: &TempDir, name: &str) -> PathBuf {
    package.path().canonicalize().unwrap().join("src").join(name)
}

pub fn config_for(package: &TempDir) -> BuildConfig {
    BuildConfig::load(package.path()).unwrap()
}

pub fn compiler_for(package: &TempDir) -> IncrementalCompiler {
    IncrementalCompiler::new(&config_for(package)).unwrap()
}

pub fn build(compiler: &mut IncrementalCompiler, dirty: &[PathBuf]) -> CompileOutput {
    compiler
        .build(&DirtySet::from_paths(dirty.iter().cloned()))
        .unwrap()
}

/// File names of a path set, relative to `root/src`.
pub fn names(root: &Path, paths: &BTreeSet<PathBuf>) -> Vec<String> {
    let base = root.canonicalize().unwrap().join("src");
    paths
        .iter()
        .map(|p| kiln_core::to_posix(&kiln_core::relative_path(p, &base)))
        .collect()
}
