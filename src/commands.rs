//! CLI command implementations

use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::sync::broadcast;

use kiln_core::BuildConfig;
use kiln_watcher::{ArtifactWriter, BuildEvent, BuildOrchestrator, CycleReport};

fn load_config(root: &Path) -> anyhow::Result<BuildConfig> {
    let config = BuildConfig::load(root)
        .with_context(|| format!("Cannot load configuration for {}", root.display()))?;
    tracing::debug!("Output directory: {}", config.out_root().display());
    Ok(config)
}

fn print_diagnostics(report: &CycleReport) {
    for diagnostic in &report.diagnostics {
        println!("{}", diagnostic);
    }
}

fn print_event(event: &BuildEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        BuildEvent::Change { cycle } => println!("[{}] building...", cycle),
        BuildEvent::Complete(report) => {
            print_diagnostics(report);
            println!(
                "[{}] done in {}ms: {} affected, {} written, {} errors, {} warnings",
                report.cycle,
                report.duration_ms,
                report.affected.len(),
                report.written.len(),
                report.error_count(),
                report.warning_count()
            );
        }
        BuildEvent::Failed { cycle, error, report } => {
            if let Some(report) = report {
                print_diagnostics(report);
            }
            println!("[{}] failed: {}", cycle, error);
        }
    }
    Ok(())
}

fn drain_events(events: &mut broadcast::Receiver<BuildEvent>, json: bool) -> anyhow::Result<()> {
    while let Ok(event) = events.try_recv() {
        print_event(&event, json)?;
    }
    Ok(())
}

pub async fn build(root: PathBuf, json: bool) -> anyhow::Result<()> {
    let config = load_config(&root)?;
    tracing::info!("Building {}", config.package_root.display());

    let mut orchestrator = BuildOrchestrator::new(config)?;
    let mut events = orchestrator.subscribe();
    let result = orchestrator.build_once().await;
    drain_events(&mut events, json)?;

    let report = result?;
    let errors = report.error_count();
    if errors > 0 {
        anyhow::bail!("Build finished with {} error(s)", errors);
    }
    Ok(())
}

pub async fn watch(root: PathBuf, json: bool) -> anyhow::Result<()> {
    let config = load_config(&root)?;
    tracing::info!("Watching {}", config.package_root.display());

    let orchestrator = BuildOrchestrator::new(config)?;
    let handle = orchestrator.handle();
    let mut events = handle.subscribe();
    let mut task = tokio::spawn(orchestrator.watch());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => print_event(&event, json)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} build events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Cannot listen for Ctrl-C")?;
                tracing::info!("Shutting down");
                handle.shutdown();
            }
            result = &mut task => {
                drain_events(&mut events, json)?;
                return Ok(result??);
            }
        }
    }

    Ok(task.await??)
}

pub async fn clean(root: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&root)?;
    ArtifactWriter::new(config.out_root(), config.root_dir_path())
        .clean()
        .await?;
    Ok(())
}
