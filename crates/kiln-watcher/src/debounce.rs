//! Debouncing of raw file events into batches
//!
//! `Debouncer` is a plain state machine driven by explicit timestamps;
//! `run_debouncer` drives it from a channel with tokio timers.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use kiln_core::{ChangeKind, FileChange};

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeMap<PathBuf, ChangeKind>,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Debouncer {
            window,
            pending: BTreeMap::new(),
            deadline: None,
        }
    }

    /// Record a change and push the deadline out to `now + window`.
    pub fn push(&mut self, change: FileChange, now: Instant) {
        self.pending
            .entry(change.path)
            .and_modify(|kind| *kind = kind.merge(change.kind))
            .or_insert(change.kind);
        self.deadline = Some(now + self.window);
    }

    /// The whole batch once the deadline has passed, at most once per batch.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<FileChange>> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                let batch = std::mem::take(&mut self.pending)
                    .into_iter()
                    .map(|(path, kind)| FileChange::new(path, kind))
                    .collect();
                Some(batch)
            }
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Batch changes from `raw` into `batches` until either side closes. A
/// pending batch is flushed when `raw` closes.
pub async fn run_debouncer(
    mut raw: mpsc::UnboundedReceiver<FileChange>,
    batches: mpsc::UnboundedSender<Vec<FileChange>>,
    window: Duration,
) {
    let mut debouncer = Debouncer::new(window);

    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            change = raw.recv() => match change {
                Some(change) => debouncer.push(change, Instant::now()),
                None => break,
            },
            _ = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                if let Some(batch) = debouncer.poll(Instant::now()) {
                    tracing::debug!("Debounced batch of {} changes", batch.len());
                    if batches.send(batch).is_err() {
                        return;
                    }
                }
            }
        }
    }

    if debouncer.pending_len() > 0 {
        if let Some(deadline) = debouncer.deadline() {
            if let Some(batch) = debouncer.poll(deadline) {
                let _ = batches.send(batch);
            }
        }
    }
}
