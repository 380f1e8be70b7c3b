//! Watch command implementation.

use crate::commands::common::{ProjectArgs, runtime};
use crate::core::CliError;
use crate::utils::ui;
use anyhow::Context as _;
use clap::Parser;
use i18n_sync_core::{ChangeKind, SyncEngine};
use notify::event::ModifyKind;
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, DebouncedEvent, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Arguments for the watch command.
#[derive(Parser)]
pub struct WatchArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Debounce window for file events, in milliseconds
    #[arg(long, default_value_t = 300)]
    pub debounce_ms: u64,
}

/// Run the watch command.
pub fn run_watch(args: WatchArgs) -> Result<(), CliError> {
    let (engine, root) = args.project.engine()?;
    let engine = Arc::new(engine);
    runtime()?.block_on(watch(engine, root, Duration::from_millis(args.debounce_ms)))
}

async fn watch(engine: Arc<SyncEngine>, root: PathBuf, debounce: Duration) -> Result<(), CliError> {
    ui::print_header("watch");
    let init = engine.initialize().await?;
    ui::print_initialized(&init);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
        // receiver gone means we are shutting down
        let _ = tx.send(result);
    })
    .context("Failed to create file watcher")?;

    let mut watched = Vec::new();
    for dir in watch_dirs(&engine) {
        if !dir.exists() {
            tracing::debug!(dir = %dir.display(), "not watching missing directory");
            continue;
        }
        debouncer
            .watch(&dir, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        watched.push(ui::display_path(&dir, &root));
    }
    if watched.is_empty() {
        return Err(CliError::Other(
            "nothing to watch: neither the locales directory nor any source directory exists"
                .to_string(),
        ));
    }
    ui::print_watching(&watched);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut tasks: JoinSet<(PathBuf, i18n_sync_core::Result<bool>)> = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = rx.recv() => match received {
                Some(Ok(events)) => {
                    for (path, kind) in changes(&events) {
                        if engine.classify(&path).is_none() {
                            continue;
                        }
                        ui::print_change(&ui::display_path(&path, &root), kind);
                        let engine = Arc::clone(&engine);
                        tasks.spawn(async move {
                            let result = engine.handle(&path, kind).await;
                            (path, result)
                        });
                    }
                },
                Some(Err(errors)) => {
                    for error in errors {
                        ui::print_watch_error(&error.to_string());
                    }
                },
                None => break,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                report(joined, &root);
            },
        }
    }

    ui::print_shutting_down();
    drop(debouncer);
    while let Some(joined) = tasks.join_next().await {
        report(joined, &root);
    }
    engine.shutdown().await?;
    Ok(())
}

fn watch_dirs(engine: &SyncEngine) -> Vec<PathBuf> {
    let layout = &engine.services().layout;
    let mut dirs = vec![layout.locales_dir.clone()];
    dirs.extend(layout.po_dir.iter().cloned());
    for dir in &layout.source_dirs {
        // nested under a directory already watched recursively
        if !dirs.iter().any(|watched| dir.starts_with(watched)) {
            dirs.push(dir.clone());
        }
    }
    dirs
}

fn report(
    joined: Result<(PathBuf, i18n_sync_core::Result<bool>), tokio::task::JoinError>,
    root: &Path,
) {
    match joined {
        Ok((_, Ok(_))) => {},
        Ok((path, Err(err))) => {
            ui::print_handle_error(&ui::display_path(&path, root), &err.to_string());
        },
        Err(err) => tracing::error!(error = %err, "change handler panicked"),
    }
}

/// Flattens debounced events into per-path changes.
///
/// A rename shows up as a name modification; whether the path still exists
/// tells the two ends apart.
fn changes(events: &[DebouncedEvent]) -> Vec<(PathBuf, ChangeKind)> {
    let mut changes: Vec<(PathBuf, ChangeKind)> = Vec::new();
    for event in events {
        for path in &event.paths {
            let kind = match event.kind {
                EventKind::Create(_) => ChangeKind::Created,
                EventKind::Modify(ModifyKind::Name(_)) if path.exists() => ChangeKind::Created,
                EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Deleted,
                EventKind::Modify(_) => ChangeKind::Changed,
                EventKind::Remove(_) => ChangeKind::Deleted,
                _ => continue,
            };
            // a burst of writes to one file collapses into its last change
            match changes.iter_mut().find(|(seen, _)| seen == path) {
                Some(entry) => entry.1 = merge(entry.1, kind),
                None => changes.push((path.clone(), kind)),
            }
        }
    }
    changes
}

fn merge(earlier: ChangeKind, later: ChangeKind) -> ChangeKind {
    match (earlier, later) {
        (ChangeKind::Created, ChangeKind::Changed) => ChangeKind::Created,
        (_, later) => later,
    }
}
