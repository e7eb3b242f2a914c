//! Session-level tests for kiln-compiler

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use kiln_core::{DiagnosticKind, DirtySet, LintConfig, error_count};

use crate::test_utils::*;
use crate::*;

fn artifact_names(output: &CompileOutput) -> Vec<String> {
    output
        .artifacts
        .iter()
        .map(|a| kiln_core::to_posix(&a.out_rel_path))
        .collect()
}

#[test]
fn test_first_build_compiles_everything() {
    let package = create_abc_package();
    let mut compiler = compiler_for(&package);

    let output = build(&mut compiler, &[]);
    assert_eq!(names(package.path(), &output.affected), vec!["a.ts", "b.ts", "c.ts"]);
    assert_eq!(artifact_names(&output), vec!["a.js", "b.js", "c.js"]);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(output.watch_files.len(), 3);
    assert_eq!(compiler.program().len(), 3);
    assert_eq!(compiler.graph().edge_count(), 1);

    let c = output.artifacts.iter().find(|a| a.out_rel_path.ends_with("c.js")).unwrap();
    assert_eq!(c.text, format!("export const c{} = 3;\n", " ".repeat(8)));
}

#[test]
fn test_unchanged_rebuild_has_empty_affected_set() {
    let package = create_abc_package();
    let mut compiler = compiler_for(&package);
    build(&mut compiler, &[]);

    let output = build(&mut compiler, &[]);
    assert!(output.affected.is_empty());
    assert!(output.artifacts.is_empty());
    assert_eq!(output.watch_files.len(), 3);

    // dirty but byte-identical
    let output = build(&mut compiler, &[src_path(&package, "b.ts")]);
    assert!(output.affected.is_empty());
}

#[test]
fn test_modifying_import_target_affects_importer() {
    let package = create_abc_package();
    let mut compiler = compiler_for(&package);
    build(&mut compiler, &[]);

    let b = src_path(&package, "b.ts");
    fs::write(&b, "export function greet(name: string): string { return name; }\n").unwrap();
    let output = build(&mut compiler, &[b.clone()]);

    assert_eq!(names(package.path(), &output.affected), vec!["a.ts", "b.ts"]);
    assert_eq!(artifact_names(&output), vec!["a.js", "b.js"]);
    assert_eq!(compiler.program().get(&b).unwrap().version, 2);
}

#[test]
fn test_forced_path_is_reemitted() {
    let package = create_abc_package();
    let mut compiler = compiler_for(&package);
    build(&mut compiler, &[]);

    let c = src_path(&package, "c.ts");
    let mut dirty = DirtySet::from_paths(vec![c.clone()]);
    dirty.forced.insert(c.clone());
    let output = compiler.build(&dirty).unwrap();
    assert_eq!(names(package.path(), &output.affected), vec!["c.ts"]);
    assert_eq!(artifact_names(&output), vec!["c.js"]);
    assert_eq!(compiler.program().get(&c).unwrap().version, 1);
}

/// A read failure halfway through a build must not half-apply the build.
#[cfg(target_os = "linux")]
#[test]
fn test_failed_build_keeps_pending_changes() {
    let package = create_package(&[
        ("src/a.ts", "export const a = 1;\n"),
        ("src/d.ts", "import { z } from './zz';\nexport const d = z;\n"),
    ]);
    let mut compiler = compiler_for(&package);
    build(&mut compiler, &[]);

    let a = src_path(&package, "a.ts");
    fs::write(&a, "export const a = 2;\n").unwrap();
    // regular file whose reads fail with EIO
    let unreadable = src_path(&package, "zz.ts");
    std::os::unix::fs::symlink("/proc/self/mem", &unreadable).unwrap();

    let dirty = DirtySet::from_paths(vec![a.clone()]);
    let error = compiler.build(&dirty).unwrap_err();
    assert!(matches!(error, CompileError::Io { .. }), "{:?}", error);
    assert_eq!(compiler.program().get(&a).unwrap().version, 1);

    fs::remove_file(&unreadable).unwrap();
    let output = compiler.build(&dirty).unwrap();
    assert_eq!(names(package.path(), &output.affected), vec!["a.ts"]);
    assert_eq!(artifact_names(&output), vec!["a.js"]);
    assert!(output.artifacts[0].text.contains("= 2;"));
    assert_eq!(compiler.program().get(&a).unwrap().version, 2);
}

#[test]
fn test_value_import_of_type_is_an_error() {
    let package = create_package(&[
        ("src/a.ts", "import { Shape, area } from './b';\nexport const s: Shape = { w: area };\n"),
        ("src/b.ts", "export interface Shape { w: number }\nexport const area = 1;\n"),
        ("src/c.ts", "import { type Shape } from './b';\nexport { Shape } from './b';\nexport const c: Shape = { w: 1 };\n"),
        ("src/ok.ts", "import type { Shape } from './b';\nexport const ok: Shape = { w: 1 };\n"),
    ]);
    let mut compiler = compiler_for(&package);
    let output = build(&mut compiler, &[]);

    let messages: Vec<_> = output.diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "'Shape' is a type and must be imported with `import type`",
            "'Shape' is a type and must be imported with `export type`",
        ]
    );
    assert_eq!(output.diagnostics[0].file.as_deref(), Some(src_path(&package, "a.ts").as_path()));
    assert_eq!((output.diagnostics[0].line, output.diagnostics[0].column), (1, 10));
    assert_eq!(artifact_names(&output), vec!["b.js", "ok.js"]);
}

#[test]
fn test_syntax_error_is_isolated() {
    let package = create_abc_package();
    write_file(
        package.path(),
        "src/c.ts",
        "export const c = ;\nexport function broken( {\n",
    );
    let mut compiler = compiler_for(&package);

    let output = build(&mut compiler, &[]);
    assert_eq!(artifact_names(&output), vec!["a.js", "b.js"]);

    let c = src_path(&package, "c.ts");
    let for_c: Vec<_> = output
        .diagnostics
        .iter()
        .filter(|d| d.file.as_deref() == Some(c.as_path()))
        .collect();
    assert_eq!(for_c.len(), 1);
    assert_eq!(for_c[0].kind, DiagnosticKind::BuildError);
    assert_eq!(for_c[0].line, 1);
    assert_eq!(error_count(&output.diagnostics), 1);
}

#[test]
fn test_deleted_import_target_is_removed() {
    let package = create_abc_package();
    let mut compiler = compiler_for(&package);
    build(&mut compiler, &[]);

    let b = src_path(&package, "b.ts");
    fs::remove_file(&b).unwrap();
    let output = build(&mut compiler, &[b.clone()]);

    assert_eq!(output.removed, BTreeSet::from([b.clone()]));
    assert_eq!(names(package.path(), &output.affected), vec!["a.ts"]);
    assert!(output.artifacts.is_empty());
    assert!(!output.watch_files.contains(&b));
    let messages: Vec<_> = output.diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["cannot resolve module './b'"]);
}

#[test]
fn test_new_file_resolves_pending_import() {
    let package = create_package(&[("src/a.ts", "import { d } from './d';\nexport const a = d;\n")]);
    let mut compiler = compiler_for(&package);
    let output = build(&mut compiler, &[]);
    assert_eq!(error_count(&output.diagnostics), 1);
    assert!(output.artifacts.is_empty());

    write_file(package.path(), "src/d.ts", "export const d = 4;\n");
    let d = src_path(&package, "d.ts");
    let output = build(&mut compiler, &[d]);
    assert_eq!(names(package.path(), &output.affected), vec!["a.ts", "d.ts"]);
    assert_eq!(artifact_names(&output), vec!["a.js", "d.js"]);
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_file_leaving_program_is_removed() {
    let package = create_package(&[
        ("src/a.ts", "import { b } from '../lib/b';\nexport const a = b;\n"),
        ("lib/b.ts", "export const b = 1;\n"),
    ]);
    let mut compiler = compiler_for(&package);
    let output = build(&mut compiler, &[]);
    assert_eq!(output.watch_files.len(), 2);

    let a = src_path(&package, "a.ts");
    fs::write(&a, "export const a = 1;\n").unwrap();
    let output = build(&mut compiler, &[a]);
    assert_eq!(output.watch_files.len(), 1);
    assert_eq!(output.removed.len(), 1);
    assert_eq!(compiler.program().len(), 1);
}

#[test]
fn test_import_cycle_warning() {
    let package = create_package(&[
        ("src/a.ts", "import { b } from './b';\nexport const a = 1;\n"),
        ("src/b.ts", "import { a } from './a';\nexport const b = 2;\n"),
    ]);
    let mut compiler = compiler_for(&package);
    let output = build(&mut compiler, &[]);

    let warnings: Vec<_> = output
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::BuildWarning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "import cycle between src/a.ts, src/b.ts");
    assert_eq!(artifact_names(&output), vec!["a.js", "b.js"]);
}

#[test]
fn test_declarations_are_watched_not_emitted() {
    let package = create_package(&[
        ("src/a.ts", "import type { Env } from './env';\nexport const env: Env = {};\n"),
        ("src/env.d.ts", "export interface Env { debug?: boolean }\n"),
    ]);
    let mut compiler = compiler_for(&package);
    let output = build(&mut compiler, &[]);
    assert_eq!(output.watch_files.len(), 2);
    assert_eq!(artifact_names(&output), vec!["a.js"]);
}

#[test]
fn test_non_erasable_syntax_blocks_emit() {
    let package = create_package(&[
        ("src/a.ts", "export enum Color { Red }\n"),
        ("src/b.ts", "export const b = 1;\n"),
    ]);
    let mut compiler = compiler_for(&package);
    let output = build(&mut compiler, &[]);
    assert_eq!(artifact_names(&output), vec!["b.js"]);
    assert_eq!(error_count(&output.diagnostics), 1);
}

#[test]
fn test_affected_is_subset_of_watch_files() {
    let package = create_abc_package();
    let mut compiler = compiler_for(&package);
    let dirty: Vec<PathBuf> = ["a.ts", "b.ts", "c.ts"].iter().map(|n| src_path(&package, n)).collect();

    for _ in 0..2 {
        let output = build(&mut compiler, &dirty);
        assert!(output.affected.is_subset(&output.watch_files));
    }
}

#[test]
fn test_lint_builtin_rules() {
    let package = create_package(&[(
        "src/a.ts",
        r#"export function f(x: any) {
    var y = 1;
    if (x == y) {
        debugger;
    }
    return y;
}
"#,
    )]);
    let mut compiler = compiler_for(&package);
    let output = build(&mut compiler, &[]);

    let engine = LintEngine::with_defaults();
    let root = package.path().canonicalize().unwrap();
    let found = engine.lint(compiler.program(), &output.affected, &root);
    let codes: Vec<_> = found
        .iter()
        .map(|d| (d.line, d.code.as_deref().unwrap_or(""), d.kind))
        .collect();
    assert_eq!(
        codes,
        vec![
            (1, "no-explicit-any", DiagnosticKind::LintWarning),
            (2, "no-var", DiagnosticKind::LintWarning),
            (3, "eqeqeq", DiagnosticKind::LintWarning),
            (4, "no-debugger", DiagnosticKind::LintError),
        ]
    );
}

#[test]
fn test_lint_config_allow_and_deny() {
    let package = create_package(&[("src/a.ts", "var a = 1;\nexport const b = a == 1;\n")]);
    let mut compiler = compiler_for(&package);
    let output = build(&mut compiler, &[]);
    let root = package.path().canonicalize().unwrap();

    let config = LintConfig {
        allow: vec!["eqeqeq".to_string()],
        deny: vec!["no-var".to_string(), "no-such-rule".to_string()],
    };
    let engine = LintEngine::new(&config);
    assert_eq!(engine.unknown_rule_names(), vec!["no-such-rule".to_string()]);

    let found = engine.lint(compiler.program(), &output.affected, &root);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, DiagnosticKind::LintError);
    assert_eq!(found[0].code.as_deref(), Some("no-var"));
}

#[test]
fn test_named_import_exists() {
    let package = create_package(&[
        ("src/a.ts", "import b, { one, two } from './b';\nimport { anything } from './star';\nexport const a = [b, one, two, anything];\n"),
        ("src/b.ts", "export const one = 1;\n"),
        ("src/star.ts", "export * from './b';\n"),
    ]);
    let mut compiler = compiler_for(&package);
    let output = build(&mut compiler, &[]);
    let root = package.path().canonicalize().unwrap();

    let found = LintEngine::with_defaults().lint(compiler.program(), &output.affected, &root);
    let messages: Vec<_> = found.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["'./b' has no default export", "'two' is not exported by './b'"]
    );
    assert!(found.iter().all(|d| d.kind == DiagnosticKind::LintError));
}

#[test]
fn test_lint_skips_files_outside_package() {
    let package = create_abc_package();
    let mut compiler = compiler_for(&package);
    let output = build(&mut compiler, &[]);
    let elsewhere = package.path().canonicalize().unwrap().join("lib");
    assert!(LintEngine::with_defaults()
        .lint(compiler.program(), &output.affected, &elsewhere)
        .is_empty());
}

#[test]
fn test_lint_skips_unparsable_files() {
    let package = create_package(&[
        ("src/broken.ts", "debugger;\nexport const x = ;\n"),
        ("src/user.ts", "import { missing } from './broken';\nexport const u = missing;\n"),
        ("src/color.ts", "enum Color { Red }\ndebugger;\nexport const c = Color.Red;\n"),
    ]);
    let mut compiler = compiler_for(&package);
    let output = build(&mut compiler, &[]);
    let root = package.path().canonicalize().unwrap();

    let broken = compiler.program().get(&src_path(&package, "broken.ts")).unwrap();
    assert!(broken.has_parse_errors());
    // not erasable, but parsed cleanly
    let color = compiler.program().get(&src_path(&package, "color.ts")).unwrap();
    assert!(!color.has_parse_errors());

    let engine = LintEngine::with_defaults();
    assert!(engine.rule_names().contains(&"named-import-exists"));
    let found = engine.lint(compiler.program(), &output.affected, &root);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].file.as_deref(), Some(src_path(&package, "color.ts").as_path()));
    assert_eq!(found[0].code.as_deref(), Some("no-debugger"));
    assert_eq!(found[0].line, 2);
}
