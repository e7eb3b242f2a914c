//! Build orchestration: build → lint → write, one cycle at a time
//!
//! The orchestrator is a single task. CPU-bound stages run on the blocking
//! pool with the compiler moved in and back out, so a second build can never
//! start while one is in flight. While a stage runs, the orchestrator keeps
//! draining commands and debounced batches into the invalidation tracker;
//! any trigger that arrives sets `pending_rebuild`, and the loop starts the
//! next cycle right after the current one finishes.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use kiln_compiler::{CompileError, Compiler, IncrementalCompiler, LintEngine, sync_index_file};
use kiln_core::{BuildConfig, FileChange, InvalidationTracker};

use crate::artifacts::{ArtifactWriter, WriteError};
use crate::debounce::run_debouncer;
use crate::events::{BuildEvent, BuildState, CycleReport};
use crate::watcher::{FileWatcher, PathFilter, WatchError};

/// Capacity of the lifecycle event channel.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error("{count} artifact(s) could not be written; first error: {first}")]
    Artifacts { count: usize, first: String },
    #[error("failed to clean output directory: {0}")]
    Clean(#[source] WriteError),
    #[error("build task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("compiler session is no longer available")]
    CompilerLost,
}

impl OrchestratorError {
    /// Errors after which no further cycle can run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Join(_) | OrchestratorError::CompilerLost
        )
    }
}

#[derive(Debug)]
pub enum Command {
    Invalidate(Vec<PathBuf>),
    Shutdown,
}

/// Cloneable handle for talking to a running orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<BuildEvent>,
    state: watch::Receiver<BuildState>,
}

impl OrchestratorHandle {
    /// Request a rebuild of `paths`. Returns false once the orchestrator is gone.
    pub fn invalidate(&self, paths: Vec<PathBuf>) -> bool {
        self.commands.send(Command::Invalidate(paths)).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> BuildState {
        *self.state.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<BuildState> {
        self.state.clone()
    }
}

async fn recv_batch(
    batches: &mut Option<mpsc::UnboundedReceiver<Vec<FileChange>>>,
) -> Option<Vec<FileChange>> {
    match batches {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Trigger intake shared by the idle wait and the in-flight stages.
struct Inbox {
    commands: mpsc::UnboundedReceiver<Command>,
    batches: Option<mpsc::UnboundedReceiver<Vec<FileChange>>>,
    tracker: InvalidationTracker,
    pending_rebuild: bool,
    shutdown: bool,
}

impl Inbox {
    fn accept_command(&mut self, command: Option<Command>) {
        match command {
            Some(Command::Invalidate(paths)) => {
                if !paths.is_empty() {
                    let added = self.tracker.invalidate(paths);
                    debug!("Invalidated {} new paths", added);
                    self.pending_rebuild = true;
                }
            }
            Some(Command::Shutdown) | None => self.shutdown = true,
        }
    }

    fn accept_batch(&mut self, batch: Option<Vec<FileChange>>) {
        match batch {
            Some(batch) => {
                debug!("Received batch of {} changes", batch.len());
                self.tracker
                    .invalidate(batch.into_iter().map(|change| change.path));
                self.pending_rebuild = true;
            }
            None => {
                warn!("Change stream closed");
                self.batches = None;
            }
        }
    }

    /// Wait until a rebuild is due. Returns false on shutdown.
    async fn wait_for_trigger(&mut self) -> bool {
        while !self.pending_rebuild && !self.shutdown {
            tokio::select! {
                command = self.commands.recv() => self.accept_command(command),
                batch = recv_batch(&mut self.batches) => self.accept_batch(batch),
            }
        }
        !self.shutdown
    }

    /// Run `stage` to completion, recording triggers that arrive meanwhile.
    async fn drive<F: Future>(&mut self, stage: F) -> F::Output {
        tokio::pin!(stage);
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv(), if !self.shutdown => self.accept_command(command),
                batch = recv_batch(&mut self.batches) => self.accept_batch(batch),
                output = &mut stage => return output,
            }
        }
    }
}

pub struct BuildOrchestrator<C: Compiler = IncrementalCompiler> {
    config: Arc<BuildConfig>,
    compiler: Option<C>,
    lint: Arc<LintEngine>,
    writer: ArtifactWriter,
    events: broadcast::Sender<BuildEvent>,
    state: watch::Sender<BuildState>,
    commands: mpsc::UnboundedSender<Command>,
    inbox: Inbox,
    watcher: Option<FileWatcher>,
    cycle: u64,
}

impl BuildOrchestrator<IncrementalCompiler> {
    pub fn new(config: BuildConfig) -> Result<Self, OrchestratorError> {
        let compiler = IncrementalCompiler::new(&config)?;
        Ok(Self::with_compiler(config, compiler))
    }
}

impl<C: Compiler> BuildOrchestrator<C> {
    pub fn with_compiler(config: BuildConfig, compiler: C) -> Self {
        let lint = LintEngine::new(&config.lint);
        for name in lint.unknown_rule_names() {
            warn!("Unknown lint rule in config: {}", name);
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(BuildState::Idle);
        let (commands, commands_rx) = mpsc::unbounded_channel();

        BuildOrchestrator {
            writer: ArtifactWriter::new(config.out_root(), config.root_dir_path()),
            config: Arc::new(config),
            compiler: Some(compiler),
            lint: Arc::new(lint),
            events,
            state,
            commands,
            inbox: Inbox {
                commands: commands_rx,
                batches: None,
                tracker: InvalidationTracker::new(),
                pending_rebuild: false,
                shutdown: false,
            },
            watcher: None,
            cycle: 0,
        }
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            commands: self.commands.clone(),
            events: self.events.clone(),
            state: self.state.subscribe(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    fn set_state(&self, state: BuildState) {
        self.state.send_replace(state);
    }

    fn emit(&self, event: BuildEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn fail(
        &mut self,
        cycle: u64,
        error: OrchestratorError,
        report: Option<CycleReport>,
    ) -> Result<CycleReport, OrchestratorError> {
        error!("Cycle {} failed: {}", cycle, error);
        self.emit(BuildEvent::Failed {
            cycle,
            error: error.to_string(),
            report,
        });
        self.set_state(BuildState::Idle);
        Err(error)
    }

    /// Run one full cycle over everything invalidated so far.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, OrchestratorError> {
        self.inbox.pending_rebuild = false;
        let dirty = self.inbox.tracker.take();
        self.cycle += 1;
        let cycle = self.cycle;
        let started_at = Utc::now();
        let timer = Instant::now();

        self.set_state(BuildState::Building);
        self.emit(BuildEvent::Change { cycle });
        info!("Cycle {} started ({} dirty paths)", cycle, dirty.paths.len());

        let Some(mut compiler) = self.compiler.take() else {
            self.inbox.tracker.restore(dirty);
            return self.fail(cycle, OrchestratorError::CompilerLost, None);
        };
        let config = self.config.clone();
        let mut request = dirty.clone();
        let compiled = self
            .inbox
            .drive(tokio::task::spawn_blocking(move || {
                if config.index.enabled {
                    match sync_index_file(&config) {
                        Ok(Some(index)) => {
                            request.paths.insert(index);
                        }
                        Ok(None) => {}
                        Err(e) => return (compiler, Err(e)),
                    }
                }
                let result = compiler.build(&request);
                (compiler, result)
            }))
            .await;

        let output = match compiled {
            Ok((compiler, result)) => {
                self.compiler = Some(compiler);
                match result {
                    Ok(output) => output,
                    Err(e) => {
                        self.inbox.tracker.restore(dirty);
                        return self.fail(cycle, e.into(), None);
                    }
                }
            }
            Err(e) => {
                self.inbox.tracker.restore(dirty);
                return self.fail(cycle, e.into(), None);
            }
        };

        self.set_state(BuildState::Linting);
        let Some(compiler) = self.compiler.take() else {
            return self.fail(cycle, OrchestratorError::CompilerLost, None);
        };
        let lint = self.lint.clone();
        let affected = output.affected.clone();
        let package_root = self.config.package_root.clone();
        let linted = self
            .inbox
            .drive(tokio::task::spawn_blocking(move || {
                let found = lint.lint(compiler.program(), &affected, &package_root);
                (compiler, found)
            }))
            .await;
        let lint_diagnostics = match linted {
            Ok((compiler, found)) => {
                self.compiler = Some(compiler);
                found
            }
            Err(e) => return self.fail(cycle, e.into(), None),
        };

        self.set_state(BuildState::WritingArtifacts);
        let writer = self.writer.clone();
        let artifacts = output.artifacts;
        let removed = output.removed.clone();
        let outcome = self
            .inbox
            .drive(async move {
                let mut outcome = writer.write_all(&artifacts).await;
                writer.remove_outputs(&removed, &mut outcome).await;
                outcome
            })
            .await;

        if let Some(watcher) = self.watcher.as_mut() {
            if let Err(e) = watcher.sync_files(&output.watch_files) {
                warn!("{}", e);
            }
        }

        let mut diagnostics = output.diagnostics;
        diagnostics.extend(lint_diagnostics);
        let report = CycleReport {
            cycle,
            affected: output.affected,
            removed: output.removed,
            diagnostics,
            invalidations: dirty.log,
            written: outcome.written,
            started_at,
            duration_ms: timer.elapsed().as_millis() as u64,
        };

        if let Some(first) = outcome.failures.first() {
            let error = OrchestratorError::Artifacts {
                count: outcome.failures.len(),
                first: first.error.to_string(),
            };
            let retry: Vec<PathBuf> = outcome
                .failures
                .iter()
                .filter(|failure| failure.error.is_retryable())
                .map(|failure| failure.source.clone())
                .collect();
            if !retry.is_empty() {
                info!("Queued {} sources for retry", retry.len());
                self.inbox.tracker.retry(retry);
            }
            return self.fail(cycle, error, Some(report));
        }

        info!(
            "Cycle {} complete in {}ms: {} affected, {} written, {} errors, {} warnings",
            cycle,
            report.duration_ms,
            report.affected.len(),
            report.written.len(),
            report.error_count(),
            report.warning_count()
        );
        self.emit(BuildEvent::Complete(report.clone()));
        self.set_state(BuildState::Idle);
        Ok(report)
    }

    /// Clean the output directory and run a single full build.
    pub async fn build_once(&mut self) -> Result<CycleReport, OrchestratorError> {
        self.writer.clean().await.map_err(OrchestratorError::Clean)?;
        self.run_cycle().await
    }

    /// Serve triggers until shutdown.
    pub async fn run(mut self) -> Result<(), OrchestratorError> {
        while self.inbox.wait_for_trigger().await {
            if let Err(e) = self.run_cycle().await {
                if e.is_fatal() {
                    return Err(e);
                }
            }
        }
        info!("Orchestrator stopped after {} cycles", self.cycle);
        Ok(())
    }

    /// Watch the source roots, build once, then rebuild on every change
    /// until shutdown. Failing to watch a root is fatal.
    pub async fn watch(mut self) -> Result<(), OrchestratorError> {
        let filter = PathFilter::new(vec![self.config.out_root()]);
        let (mut watcher, raw) = FileWatcher::new(filter)?;
        for root in self.config.root_paths() {
            watcher.watch_directory(&root)?;
        }

        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_debouncer(raw, batch_tx, self.config.debounce()));
        self.inbox.batches = Some(batch_rx);
        self.watcher = Some(watcher);

        self.writer.clean().await.map_err(OrchestratorError::Clean)?;
        self.inbox.pending_rebuild = true;
        self.run().await
    }
}
