//! Relative module resolution
//!
//! Only `./` and `../` specifiers are resolved against the filesystem; bare
//! specifiers name packages and are left to the runtime.

use std::path::{Path, PathBuf};

use kiln_core::normalize;

/// Outcome of resolving one import specifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Resolution {
    /// A source file in the program.
    Resolved(PathBuf),
    /// A relative specifier with no matching file.
    Unresolved,
    /// A package import; not part of the program.
    External,
}

impl Resolution {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Resolution::Resolved(path) => Some(path),
            _ => None,
        }
    }
}

/// Extensions tried, in order, for an extensionless specifier.
const CANDIDATE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".d.ts", ".mts", ".cts"];

/// Index files tried for a directory specifier.
const INDEX_FILES: &[&str] = &["index.ts", "index.tsx", "index.d.ts"];

/// JavaScript extensions written in specifiers that map back to sources.
const JS_TO_TS: &[(&str, &[&str])] = &[
    (".js", &[".ts", ".tsx", ".d.ts"]),
    (".jsx", &[".tsx"]),
    (".mjs", &[".mts", ".d.mts"]),
    (".cjs", &[".cts", ".d.cts"]),
];

pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Resolve `specifier` as written in `importer`.
pub fn resolve_specifier(importer: &Path, specifier: &str) -> Resolution {
    resolve_with(importer, specifier, |path| path.is_file())
}

/// Resolution with an injectable existence check.
pub fn resolve_with<F>(importer: &Path, specifier: &str, exists: F) -> Resolution
where
    F: Fn(&Path) -> bool,
{
    if !is_relative_specifier(specifier) {
        return Resolution::External;
    }

    let dir = importer.parent().unwrap_or_else(|| Path::new(""));
    let base = normalize(&dir.join(specifier));

    for candidate in candidates(&base, specifier) {
        if exists(&candidate) {
            return Resolution::Resolved(candidate);
        }
    }
    Resolution::Unresolved
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut text = base.as_os_str().to_os_string();
    text.push(suffix);
    PathBuf::from(text)
}

fn candidates(base: &Path, specifier: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();

    // Explicit source extension.
    if kiln_core::is_source_file(base) && !specifier.ends_with('/') {
        out.push(base.to_path_buf());
        return out;
    }

    // `./x.js` written for `./x.ts`.
    let text = base.to_string_lossy();
    for (js, sources) in JS_TO_TS {
        if let Some(stem) = text.strip_suffix(js) {
            for ext in *sources {
                out.push(PathBuf::from(format!("{}{}", stem, ext)));
            }
            return out;
        }
    }

    if !specifier.ends_with('/') {
        for ext in CANDIDATE_EXTENSIONS {
            out.push(with_suffix(base, ext));
        }
    }
    for index in INDEX_FILES {
        out.push(base.join(index));
    }
    out
}

/// Rewrite a relative specifier's source extension to the emitted one.
/// Returns `None` when no rewrite applies.
pub fn rewrite_specifier_extension(specifier: &str) -> Option<String> {
    if !is_relative_specifier(specifier) || specifier.ends_with(".d.ts") {
        return None;
    }
    const REWRITES: &[(&str, &str)] = &[
        (".tsx", ".jsx"),
        (".mts", ".mjs"),
        (".cts", ".cjs"),
        (".ts", ".js"),
    ];
    REWRITES.iter().find_map(|(from, to)| {
        specifier
            .strip_suffix(from)
            .map(|stem| format!("{}{}", stem, to))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn resolve_in(files: &[&str], importer: &str, specifier: &str) -> Resolution {
        let files: BTreeSet<PathBuf> = files.iter().map(PathBuf::from).collect();
        resolve_with(Path::new(importer), specifier, |p| files.contains(p))
    }

    #[test]
    fn test_extensionless_and_index() {
        let files = ["/p/src/a.ts", "/p/src/b.ts", "/p/src/util/index.ts", "/p/src/view.tsx"];
        assert_eq!(
            resolve_in(&files, "/p/src/a.ts", "./b"),
            Resolution::Resolved(PathBuf::from("/p/src/b.ts"))
        );
        assert_eq!(
            resolve_in(&files, "/p/src/a.ts", "./util"),
            Resolution::Resolved(PathBuf::from("/p/src/util/index.ts"))
        );
        assert_eq!(
            resolve_in(&files, "/p/src/a.ts", "./view"),
            Resolution::Resolved(PathBuf::from("/p/src/view.tsx"))
        );
    }

    #[test]
    fn test_js_extension_maps_to_source() {
        let files = ["/p/src/a.ts", "/p/src/b.ts", "/p/src/c.mts"];
        assert_eq!(
            resolve_in(&files, "/p/src/a.ts", "./b.js"),
            Resolution::Resolved(PathBuf::from("/p/src/b.ts"))
        );
        assert_eq!(
            resolve_in(&files, "/p/src/a.ts", "./c.mjs"),
            Resolution::Resolved(PathBuf::from("/p/src/c.mts"))
        );
        assert_eq!(
            resolve_in(&files, "/p/src/a.ts", "./b.ts"),
            Resolution::Resolved(PathBuf::from("/p/src/b.ts"))
        );
    }

    #[test]
    fn test_parent_directory_and_missing() {
        let files = ["/p/shared/util.ts"];
        assert_eq!(
            resolve_in(&files, "/p/src/a.ts", "../shared/util"),
            Resolution::Resolved(PathBuf::from("/p/shared/util.ts"))
        );
        assert_eq!(resolve_in(&files, "/p/src/a.ts", "./gone"), Resolution::Unresolved);
        assert_eq!(resolve_in(&files, "/p/src/a.ts", "rxjs"), Resolution::External);
        assert_eq!(resolve_in(&files, "/p/src/a.ts", "@scope/pkg"), Resolution::External);
    }

    #[test]
    fn test_rewrite_specifier_extension() {
        assert_eq!(rewrite_specifier_extension("./b.ts").as_deref(), Some("./b.js"));
        assert_eq!(rewrite_specifier_extension("./v.tsx").as_deref(), Some("./v.jsx"));
        assert_eq!(rewrite_specifier_extension("../m.mts").as_deref(), Some("../m.mjs"));
        assert_eq!(rewrite_specifier_extension("./b"), None);
        assert_eq!(rewrite_specifier_extension("pkg.ts"), None);
    }
}
