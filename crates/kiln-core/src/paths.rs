//! Lexical path helpers and the output-root guard

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("output path {path} resolves outside output root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::RootDir | Component::Normal(_) | Component::Prefix(_) => {
                normalized.push(component.as_os_str());
            }
        }
    }

    normalized
}

/// True if `child` lies strictly below `parent` after normalization.
pub fn is_descendant(child: &Path, parent: &Path) -> bool {
    let child = normalize(child);
    let parent = normalize(parent);
    child != parent && child.starts_with(&parent)
}

/// Join `relative` onto `root` and reject anything that escapes it.
pub fn resolve_within(root: &Path, relative: &Path) -> Result<PathBuf, PathError> {
    let resolved = normalize(&root.join(relative));
    if is_descendant(&resolved, root) {
        Ok(resolved)
    } else {
        Err(PathError::OutsideRoot {
            path: resolved,
            root: root.to_path_buf(),
        })
    }
}

/// Path of `path` relative to `base`, with `..` steps when `path` is not
/// below `base`. Both are normalized first.
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
    let path = normalize(path);
    let base = normalize(base);

    let path_parts: Vec<Component<'_>> = path.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();
    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &path_parts[common..] {
        relative.push(part.as_os_str());
    }
    relative
}

/// Render a relative path with forward slashes.
pub fn to_posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
