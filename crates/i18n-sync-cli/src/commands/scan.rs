//! Scan command implementation.

use crate::commands::common::{ProjectArgs, runtime};
use crate::core::CliError;
use crate::utils::ui;
use clap::Parser;
use std::time::Instant;

/// Arguments for the scan command.
#[derive(Parser)]
pub struct ScanArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

/// Run the scan command.
pub fn run_scan(args: ScanArgs) -> Result<(), CliError> {
    let (engine, _root) = args.project.engine()?;

    runtime()?.block_on(async {
        ui::print_header("scan");
        let start = Instant::now();

        let init = engine.initialize().await?;
        ui::print_initialized(&init);

        let report = engine.scan().await?;
        engine.shutdown().await?;

        ui::print_scan_summary(&report, start.elapsed());
        Ok::<_, CliError>(())
    })
}
