//! Kiln Core — source model, dependency graph, invalidation tracking and config

pub mod config;
pub mod diagnostic;
pub mod graph;
pub mod invalidation;
pub mod model;
pub mod paths;


pub use config::{BuildConfig, ConfigError, IndexConfig, LintConfig, CONFIG_FILE};
pub use diagnostic::{Diagnostic, DiagnosticKind, error_count};
pub use graph::DependencyGraph;
pub use invalidation::{DirtySet, Invalidation, InvalidationReason, InvalidationTracker};
pub use model::{ChangeKind, ContentHash, EmittedArtifact, FileChange, SourceKind, is_source_file};
pub use paths::{PathError, is_descendant, normalize, relative_path, resolve_within, to_posix};
