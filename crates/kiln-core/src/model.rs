//! Core data types shared by the build pipeline

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_128;

/// XXH3-128 hash of a source file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub u128);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        ContentHash(xxh3_128(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Flavour of a TypeScript source, decided by its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// `.ts`
    TypeScript,
    /// `.tsx`
    Tsx,
    /// `.mts`
    ModuleTypeScript,
    /// `.cts`
    CommonTypeScript,
    /// `.d.ts`, `.d.mts`, `.d.cts`
    Declaration,
}

impl SourceKind {
    /// Detect the source kind from a path. Returns `None` for non-TypeScript files.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts") {
            return Some(SourceKind::Declaration);
        }
        match path.extension()?.to_str()? {
            "ts" => Some(SourceKind::TypeScript),
            "tsx" => Some(SourceKind::Tsx),
            "mts" => Some(SourceKind::ModuleTypeScript),
            "cts" => Some(SourceKind::CommonTypeScript),
            _ => None,
        }
    }

    /// Extension of the emitted JavaScript file. Declarations emit nothing.
    pub fn output_extension(self) -> Option<&'static str> {
        match self {
            SourceKind::TypeScript => Some("js"),
            SourceKind::Tsx => Some("jsx"),
            SourceKind::ModuleTypeScript => Some("mjs"),
            SourceKind::CommonTypeScript => Some("cjs"),
            SourceKind::Declaration => None,
        }
    }

    pub fn is_declaration(self) -> bool {
        self == SourceKind::Declaration
    }

    pub fn is_tsx(self) -> bool {
        self == SourceKind::Tsx
    }
}

/// Check if a path is a TypeScript source the pipeline cares about.
pub fn is_source_file(path: &Path) -> bool {
    SourceKind::from_path(path).is_some()
}

/// An output file produced by the compiler for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedArtifact {
    /// Absolute path of the source this artifact was emitted from.
    pub source: PathBuf,
    /// Output path, relative to the configured output root.
    pub out_rel_path: PathBuf,
    pub text: String,
}

/// Kind of filesystem change observed by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Fold a later change of the same path into this one.
    pub fn merge(self, later: ChangeKind) -> ChangeKind {
        match (self, later) {
            (ChangeKind::Created, ChangeKind::Removed) => ChangeKind::Removed,
            (ChangeKind::Removed, ChangeKind::Created) => ChangeKind::Modified,
            (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Created,
            (_, later) => later,
        }
    }
}

/// A single observed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        FileChange {
            path: path.into(),
            kind,
        }
    }
}
