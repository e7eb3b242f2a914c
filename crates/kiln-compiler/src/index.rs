//! Generated `index.ts` barrel for the package root directory

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use kiln_core::{BuildConfig, SourceKind, is_descendant, relative_path, to_posix};

use crate::CompileError;

pub const INDEX_FILE: &str = "index.ts";

fn is_exported_module(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name == INDEX_FILE || name.ends_with(".spec.ts") {
        return false;
    }
    SourceKind::from_path(path).is_some_and(|kind| !kind.is_declaration())
}

/// Render the barrel for the given module paths (absolute).
pub fn render_index(root_dir: &Path, modules: &[PathBuf], polyfills: &[String]) -> String {
    let mut specifiers: Vec<String> = modules
        .iter()
        .filter(|path| is_exported_module(path))
        .map(|path| {
            let relative = to_posix(&relative_path(path, root_dir).with_extension(""));
            format!("./{}", relative)
        })
        .collect();
    specifiers.sort();
    specifiers.dedup();

    let mut text = String::new();
    for polyfill in polyfills {
        text.push_str(&format!("import \"{}\";\n", polyfill));
    }
    for specifier in specifiers {
        text.push_str(&format!("export * from \"{}\";\n", specifier));
    }
    text
}

/// Regenerate `<root_dir>/index.ts`. Returns the path when the file was
/// written, `None` when it was already up to date.
pub fn sync_index_file(config: &BuildConfig) -> Result<Option<PathBuf>, CompileError> {
    let root_dir = config.root_dir_path();
    let out_root = config.out_root();
    let index_path = root_dir.join(INDEX_FILE);

    let mut modules = Vec::new();
    if root_dir.is_dir() {
        for entry in WalkBuilder::new(&root_dir).require_git(false).build() {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_some_and(|t| t.is_file())
                && !is_descendant(path, &out_root)
                && !path.components().any(|c| c.as_os_str() == "node_modules")
            {
                modules.push(path.to_path_buf());
            }
        }
    }

    let text = render_index(&root_dir, &modules, &config.index.polyfills);
    match std::fs::read_to_string(&index_path) {
        Ok(existing) if existing == text => return Ok(None),
        _ => {}
    }

    std::fs::create_dir_all(&root_dir).map_err(|source| CompileError::Io {
        path: root_dir.clone(),
        source,
    })?;
    std::fs::write(&index_path, text).map_err(|source| CompileError::Io {
        path: index_path.clone(),
        source,
    })?;
    tracing::info!("Updated {}", index_path.display());
    Ok(Some(index_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_package;

    #[test]
    fn test_render_index() {
        let root = Path::new("/pkg/src");
        let modules = vec![
            PathBuf::from("/pkg/src/b.ts"),
            PathBuf::from("/pkg/src/a/inner.tsx"),
            PathBuf::from("/pkg/src/index.ts"),
            PathBuf::from("/pkg/src/types.d.ts"),
            PathBuf::from("/pkg/src/b.spec.ts"),
        ];
        let text = render_index(root, &modules, &["zone.js".to_string()]);
        insta::assert_snapshot!(text, @r#"
        import "zone.js";
        export * from "./a/inner";
        export * from "./b";
        "#);
    }

    #[test]
    fn test_sync_writes_only_on_change() {
        let package = create_package(&[
            ("src/a.ts", "export const a = 1;"),
            ("src/util/b.ts", "export const b = 2;"),
        ]);
        let mut config = BuildConfig::for_package(package.path());
        config.index.enabled = true;

        let written = sync_index_file(&config).unwrap();
        let index = package.path().join("src/index.ts");
        assert_eq!(written.as_deref(), Some(index.as_path()));
        assert_eq!(
            std::fs::read_to_string(&index).unwrap(),
            "export * from \"./a\";\nexport * from \"./util/b\";\n"
        );

        assert_eq!(sync_index_file(&config).unwrap(), None);
    }
}
