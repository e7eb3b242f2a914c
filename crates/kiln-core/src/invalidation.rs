//! Dirty-set tracking between build cycles
//!
//! Invalidations accumulate here while a build is in flight and are
//! consumed in one piece when the next build starts. Besides the set, an
//! ordered log keeps every invalidation with a sequence number so a cycle
//! can report which changes it folded together.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Why a path was marked dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    /// The file changed on disk or was invalidated explicitly.
    Changed,
    /// A previous cycle failed to write the file's output; re-emit it even if
    /// its content is unchanged.
    Retry,
}

/// One entry of the ordered dirty log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    pub sequence: u64,
    pub path: PathBuf,
    pub reason: InvalidationReason,
}

/// The dirty state handed to one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    pub paths: BTreeSet<PathBuf>,
    /// Subset of `paths` that must be re-emitted regardless of content.
    pub forced: BTreeSet<PathBuf>,
    pub log: Vec<Invalidation>,
}

impl DirtySet {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &std::path::Path) -> bool {
        self.paths.contains(path)
    }

    pub fn is_forced(&self, path: &std::path::Path) -> bool {
        self.forced.contains(path)
    }

    /// Build a dirty set from plain paths, without a log.
    pub fn from_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        DirtySet {
            paths: paths.into_iter().collect(),
            ..Default::default()
        }
    }
}

/// Accumulates invalidations until the next build consumes them.
#[derive(Debug, Default)]
pub struct InvalidationTracker {
    dirty: BTreeSet<PathBuf>,
    forced: BTreeSet<PathBuf>,
    log: Vec<Invalidation>,
    next_sequence: u64,
}

impl InvalidationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark paths dirty. Returns how many were not dirty before.
    pub fn invalidate<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.record(paths, InvalidationReason::Changed)
    }

    /// Mark paths dirty and force their re-emission.
    pub fn retry<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.record(paths, InvalidationReason::Retry)
    }

    fn record<I>(&mut self, paths: I, reason: InvalidationReason) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut added = 0;
        for path in paths {
            self.next_sequence += 1;
            self.log.push(Invalidation {
                sequence: self.next_sequence,
                path: path.clone(),
                reason,
            });
            if reason == InvalidationReason::Retry {
                self.forced.insert(path.clone());
            }
            if self.dirty.insert(path) {
                added += 1;
            }
        }
        added
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    /// Consume the dirty state for the next build.
    pub fn take(&mut self) -> DirtySet {
        DirtySet {
            paths: std::mem::take(&mut self.dirty),
            forced: std::mem::take(&mut self.forced),
            log: std::mem::take(&mut self.log),
        }
    }

    /// Put back a dirty set whose build did not complete. Its log entries
    /// keep their place ahead of anything recorded since.
    pub fn restore(&mut self, earlier: DirtySet) {
        self.dirty.extend(earlier.paths);
        self.forced.extend(earlier.forced);
        let mut log = earlier.log;
        log.append(&mut self.log);
        self.log = log;
    }
}
