use clap::{Parser, Subcommand};
use i18n_sync_cli::commands::{ScanArgs, SyncArgs, WatchArgs, run_scan, run_sync, run_watch};
use miette::Result as MietteResult;

#[derive(Parser)]
#[command(name = "i18n-sync")]
#[command(about = "Keeps translation resources, PO files and code keys in step")]
#[command(version)]
struct Cli {
    /// Log engine activity at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the project and sync every change as it happens
    Watch(WatchArgs),

    /// Add keys used in code to every locale and drop unused ones
    Scan(ScanArgs),

    /// Fill every locale from the source locale once
    Sync(SyncArgs),
}

fn main() -> MietteResult<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .color(true)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    i18n_sync_cli::utils::ui::init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Watch(args) => run_watch(args),
        Commands::Scan(args) => run_scan(args),
        Commands::Sync(args) => run_sync(args),
    };

    result.map_err(miette::Report::new)
}
