//! Filesystem watcher implementation

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use kiln_core::{ChangeKind, FileChange, is_source_file};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to start file watcher: {0}")]
    Init(#[source] notify::Error),
    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Decides which raw paths are forwarded.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    ignored_roots: Vec<PathBuf>,
}

impl PathFilter {
    pub fn new(ignored_roots: Vec<PathBuf>) -> Self {
        PathFilter { ignored_roots }
    }

    pub fn accepts(&self, path: &Path) -> bool {
        if !is_source_file(path) {
            return false;
        }
        let in_ignored_dir = path.components().any(|component| {
            let name = component.as_os_str();
            name == ".git" || name == "node_modules"
        });
        !in_ignored_dir && !self.ignored_roots.iter().any(|root| path.starts_with(root))
    }
}

/// Translate a notify event into source changes.
fn translate(event: notify::Event, filter: &PathFilter) -> Vec<FileChange> {
    let kinds: Vec<(PathBuf, ChangeKind)> = match event.kind {
        EventKind::Create(_) => event
            .paths
            .into_iter()
            .map(|p| (p, ChangeKind::Created))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .into_iter()
            .map(|p| (p, ChangeKind::Removed))
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => {
            let mut paths = event.paths.into_iter();
            match mode {
                RenameMode::From => paths.map(|p| (p, ChangeKind::Removed)).collect(),
                RenameMode::To => paths.map(|p| (p, ChangeKind::Created)).collect(),
                RenameMode::Both => {
                    let mut out = Vec::new();
                    if let Some(from) = paths.next() {
                        out.push((from, ChangeKind::Removed));
                    }
                    out.extend(paths.map(|p| (p, ChangeKind::Created)));
                    out
                }
                _ => paths
                    .map(|p| {
                        let kind = if p.exists() {
                            ChangeKind::Created
                        } else {
                            ChangeKind::Removed
                        };
                        (p, kind)
                    })
                    .collect(),
            }
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => event
            .paths
            .into_iter()
            .map(|p| (p, ChangeKind::Modified))
            .collect(),
        _ => Vec::new(),
    };

    kinds
        .into_iter()
        .filter(|(path, _)| filter.accepts(path))
        .map(|(path, kind)| FileChange::new(path, kind))
        .collect()
}

/// File system watcher for the source roots and the files the program
/// reached outside them.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    directories: BTreeSet<PathBuf>,
    files: BTreeSet<PathBuf>,
}

impl FileWatcher {
    /// Create a watcher. Changes are delivered on the returned receiver.
    pub fn new(filter: PathFilter) -> Result<(Self, mpsc::UnboundedReceiver<FileChange>), WatchError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => {
                    debug!("File system event: {:?}", event);
                    for change in translate(event, &filter) {
                        if event_tx.send(change).is_err() {
                            warn!("Change receiver dropped");
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!("File system watch error: {}", e);
                }
            }
        })
        .map_err(WatchError::Init)?;

        let watcher = FileWatcher {
            watcher,
            directories: BTreeSet::new(),
            files: BTreeSet::new(),
        };
        Ok((watcher, event_rx))
    }

    /// Watch a directory recursively
    pub fn watch_directory(&mut self, path: &Path) -> Result<(), WatchError> {
        if self.directories.contains(path) {
            return Ok(());
        }
        info!("Watching directory: {}", path.display());
        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Watch {
                path: path.to_path_buf(),
                source,
            })?;
        self.directories.insert(path.to_path_buf());
        Ok(())
    }

    /// Watch a single file
    pub fn watch_file(&mut self, path: &Path) -> Result<(), WatchError> {
        if self.files.contains(path) {
            return Ok(());
        }
        debug!("Watching file: {}", path.display());
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Watch {
                path: path.to_path_buf(),
                source,
            })?;
        self.files.insert(path.to_path_buf());
        Ok(())
    }

    fn unwatch_file(&mut self, path: &Path) {
        if let Err(e) = self.watcher.unwatch(path) {
            debug!("Failed to unwatch {}: {}", path.display(), e);
        }
        self.files.remove(path);
    }

    fn covered_by_directory(&self, path: &Path) -> bool {
        self.directories.iter().any(|dir| path.starts_with(dir))
    }

    /// Bring individual file watches in line with the program's files.
    /// Files below a watched directory need no watch of their own. Returns
    /// the first error; the remaining files are still processed.
    pub fn sync_files(&mut self, program_files: &BTreeSet<PathBuf>) -> Result<(), WatchError> {
        let stale: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|path| !program_files.contains(*path))
            .cloned()
            .collect();
        for path in stale {
            self.unwatch_file(&path);
        }

        let mut first_error = None;
        for path in program_files {
            if self.covered_by_directory(path) {
                continue;
            }
            if let Err(e) = self.watch_file(path) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Check if a path is being watched, directly or through a directory
    pub fn is_watching(&self, path: &Path) -> bool {
        self.files.contains(path) || self.covered_by_directory(path)
    }

    pub fn watched_files(&self) -> &BTreeSet<PathBuf> {
        &self.files
    }
}
