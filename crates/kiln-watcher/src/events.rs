//! Build lifecycle events and state

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kiln_core::{Diagnostic, DiagnosticKind, Invalidation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Idle,
    Building,
    Linting,
    WritingArtifacts,
}

/// Summary of one build cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub affected: BTreeSet<PathBuf>,
    pub removed: BTreeSet<PathBuf>,
    /// Build diagnostics followed by lint diagnostics, each sorted.
    pub diagnostics: Vec<Diagnostic>,
    /// Invalidations folded into this cycle, in arrival order.
    pub invalidations: Vec<Invalidation>,
    /// Output files written.
    pub written: Vec<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl CycleReport {
    pub fn error_count(&self) -> usize {
        kiln_core::error_count(&self.diagnostics)
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count()
    }

    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BuildEvent {
    /// A cycle started.
    Change { cycle: u64 },
    /// A cycle finished and its outputs are on disk.
    Complete(CycleReport),
    /// A cycle ended with a fatal error. Compiled results are attached
    /// when the failure happened after compilation.
    Failed {
        cycle: u64,
        error: String,
        report: Option<CycleReport>,
    },
}

impl BuildEvent {
    pub fn cycle(&self) -> u64 {
        match self {
            BuildEvent::Change { cycle } | BuildEvent::Failed { cycle, .. } => *cycle,
            BuildEvent::Complete(report) => report.cycle,
        }
    }
}
