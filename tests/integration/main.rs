//! Integration tests for Kiln
//!
//! These tests drive full build cycles against packages on disk.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use kiln_compiler::{Compiler, IncrementalCompiler};
use kiln_core::{BuildConfig, DiagnosticKind, DirtySet};
use kiln_watcher::{BuildEvent, BuildOrchestrator, OrchestratorError};

fn create_package(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (relative, content) in files {
        let path = temp_dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    temp_dir
}

fn orchestrator_for(package: &TempDir) -> BuildOrchestrator {
    let config = BuildConfig::load(package.path()).unwrap();
    BuildOrchestrator::new(config).unwrap()
}

fn src(package: &TempDir, name: &str) -> PathBuf {
    package.path().canonicalize().unwrap().join("src").join(name)
}

fn read(package: &TempDir, relative: &str) -> String {
    fs::read_to_string(package.path().join(relative)).unwrap()
}

/// Test that a two-file package builds and its outputs mirror the sources
#[tokio::test]
async fn test_build_package() {
    let package = create_package(&[
        (
            "src/a.ts",
            "import { greet } from './b';\nexport const message: string = greet('kiln');\n",
        ),
        (
            "src/b.ts",
            "export function greet(name: string): string {\n  return `hi ${name}`;\n}\n",
        ),
        ("src/types.d.ts", "declare const VERSION: string;\n"),
    ]);

    let mut orchestrator = orchestrator_for(&package);
    let report = orchestrator.build_once().await.unwrap();

    assert_eq!(
        report.affected,
        BTreeSet::from([src(&package, "a.ts"), src(&package, "b.ts"), src(&package, "types.d.ts")])
    );
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.written.len(), 2);
    assert!(read(&package, "dist/a.js").starts_with("import { greet } from './b';"));
    assert!(!read(&package, "dist/b.js").contains(": string"));
    assert!(!package.path().join("dist/types.js").exists());
}

/// Test that a syntax error is reported without stopping other outputs
#[tokio::test]
async fn test_syntax_error_is_isolated() {
    let package = create_package(&[
        ("src/a.ts", "export const a = 1;\n"),
        ("src/c.ts", "export const c = ;\n"),
    ]);

    let mut orchestrator = orchestrator_for(&package);
    let report = orchestrator.build_once().await.unwrap();

    assert_eq!(report.count_of(DiagnosticKind::BuildError), 1);
    let diagnostic = &report.diagnostics[0];
    assert_eq!(diagnostic.file.as_deref(), Some(src(&package, "c.ts").as_path()));
    assert_eq!(diagnostic.line, 1);
    assert!(diagnostic.message.starts_with("syntax error"));
    assert!(package.path().join("dist/a.js").exists());
    assert!(!package.path().join("dist/c.js").exists());
}

/// Test that an output escaping the output root fails the cycle but keeps
/// the outputs that could be written
#[tokio::test]
async fn test_output_outside_root_fails_cycle() {
    let package = create_package(&[
        ("kiln.toml", "roots = [\"src\", \"shared\"]\n"),
        (
            "src/a.ts",
            "import { util } from '../shared/util';\nexport const a = util();\n",
        ),
        ("shared/util.ts", "export function util(): number {\n  return 1;\n}\n"),
    ]);

    let mut orchestrator = orchestrator_for(&package);
    let mut events = orchestrator.subscribe();
    let error = orchestrator.build_once().await.unwrap_err();

    assert!(matches!(error, OrchestratorError::Artifacts { count: 1, .. }));
    assert!(package.path().join("dist/a.js").exists());
    assert!(!package.path().join("shared/util.js").exists());

    assert_eq!(events.recv().await.unwrap(), BuildEvent::Change { cycle: 1 });
    match events.recv().await.unwrap() {
        BuildEvent::Failed { cycle, report, .. } => {
            assert_eq!(cycle, 1);
            let report = report.unwrap();
            assert_eq!(report.affected.len(), 2);
            assert_eq!(report.written.len(), 1);
        }
        other => panic!("expected failed, got {:?}", other),
    }
}

/// Test that a rebuild with nothing invalidated touches nothing
#[tokio::test]
async fn test_unchanged_rebuild() {
    let package = create_package(&[("src/a.ts", "export const a = 1;\n")]);

    let mut orchestrator = orchestrator_for(&package);
    orchestrator.build_once().await.unwrap();
    let report = orchestrator.run_cycle().await.unwrap();

    assert_eq!(report.cycle, 2);
    assert!(report.affected.is_empty());
    assert!(report.written.is_empty());
}

/// Test that every rebuilt file is one the watcher is told about
#[tokio::test]
async fn test_affected_files_are_watched() {
    let package = create_package(&[
        ("src/a.ts", "import { b } from './b';\nexport const a = b;\n"),
        ("src/b.ts", "import type { T } from './t';\nexport const b: T = 1;\n"),
        ("src/t.d.ts", "export type T = number;\n"),
    ]);

    let config = BuildConfig::load(package.path()).unwrap();
    let mut compiler = IncrementalCompiler::new(&config).unwrap();
    let output = compiler.build(&DirtySet::default()).unwrap();

    assert_eq!(output.affected.len(), 3);
    assert!(output.affected.is_subset(&output.watch_files));
    assert!(watched(&output.watch_files, &package.path().canonicalize().unwrap()));
}

fn watched(files: &BTreeSet<PathBuf>, root: &Path) -> bool {
    files.iter().all(|file| file.starts_with(root))
}
