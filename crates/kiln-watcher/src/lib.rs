//! File watching, debouncing, artifact output and build orchestration

pub mod artifacts;
pub mod debounce;
pub mod events;
pub mod orchestrator;
pub mod watcher;


pub use artifacts::{ArtifactWriter, WriteError, WriteFailure, WriteOutcome};
pub use debounce::{Debouncer, run_debouncer};
pub use events::{BuildEvent, BuildState, CycleReport};
pub use orchestrator::{BuildOrchestrator, Command, OrchestratorError, OrchestratorHandle};
pub use watcher::{FileWatcher, PathFilter, WatchError};
