//! Sync command implementation.

use crate::commands::common::{ProjectArgs, runtime};
use crate::core::{CliError, ResourceSyncFailure, SyncFailureReport};
use crate::utils::ui;
use clap::Parser;
use std::time::Instant;

/// Arguments for the sync command.
#[derive(Parser)]
pub struct SyncArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

/// Run the sync command.
pub fn run_sync(args: SyncArgs) -> Result<(), CliError> {
    let (engine, _root) = args.project.engine()?;

    let report = runtime()?.block_on(async {
        ui::print_header("sync");
        let start = Instant::now();

        let init = engine.initialize().await?;
        ui::print_initialized(&init);

        let report = engine.sync_all().await?;
        ui::print_sync_summary(&report, start.elapsed());
        Ok::<_, CliError>(report)
    })?;

    let failed = report.propagation.failed;
    if failed.is_empty() {
        return Ok(());
    }

    Err(SyncFailureReport {
        failed_count: failed.len(),
        failures: failed
            .into_iter()
            .map(|(path, message)| ResourceSyncFailure { path, message })
            .collect(),
    }
    .into())
}
