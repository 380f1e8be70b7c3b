// CLI output formatting with consistent styling using colored.
// Summaries go to stdout with println!; diagnostics and logs go to stderr.

use colored::Colorize as _;
use i18n_sync_core::{ChangeKind, InitReport, ScanReport, SyncAllReport};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const PREFIX: &str = "[i18n-sync]";

/// Installs the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `i18n_sync=info`, or `i18n_sync=debug`
/// with `verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        "i18n_sync=debug"
    } else {
        "i18n_sync=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// `path` relative to `root` when it lies below it.
pub fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

pub fn print_header(title: &str) {
    println!("{}", format!("i18n-sync {title}").dimmed());
}

pub fn print_initialized(report: &InitReport) {
    println!(
        "{} {} ({} cached code file(s))",
        "Loaded".dimmed(),
        format!("{} resource(s)", report.resources).green(),
        report.cached_code_files.to_string().cyan()
    );
    for (path, error) in &report.failed {
        eprintln!(
            "{} {}: {}",
            "Could not load".yellow(),
            path.display().to_string().white().bold(),
            error
        );
    }
}

pub fn print_watching(dirs: &[String]) {
    println!(
        "{} {} {}",
        PREFIX.cyan().bold(),
        "Watching".dimmed(),
        dirs.join(", ").green()
    );
    println!("{} {}", PREFIX.cyan().bold(), "Press Ctrl+C to stop".dimmed());
}

pub fn print_change(path: &str, kind: ChangeKind) {
    let verb = match kind {
        ChangeKind::Created => "Created",
        ChangeKind::Changed => "Changed",
        ChangeKind::Deleted => "Deleted",
    };
    println!("{} {} {}", PREFIX.cyan().bold(), verb.dimmed(), path.green());
}

pub fn print_handle_error(path: &str, error: &str) {
    eprintln!(
        "{} {} {}: {}",
        PREFIX.red().bold(),
        "Failed to process".red(),
        path.white().bold(),
        error
    );
}

pub fn print_watch_error(error: &str) {
    eprintln!("{} {} {}", PREFIX.red().bold(), "Watch error:".red(), error);
}

pub fn print_shutting_down() {
    println!("\n{} {}", PREFIX.cyan().bold(), "Shutting down...".dimmed());
}

pub fn print_scan_summary(report: &ScanReport, duration: Duration) {
    println!(
        "{} {} code file(s), {} key(s) in {:.2?}",
        "Scanned".dimmed(),
        report.files.to_string().cyan(),
        report.keys.to_string().cyan(),
        duration
    );
    if report.written.is_empty() {
        println!("{}", "All resources are up to date!".green());
    } else {
        println!(
            "{} {} added, {} removed across {} resource(s)",
            "Done:".green(),
            report.added,
            report.removed,
            report.written.len()
        );
    }
}

pub fn print_sync_summary(report: &SyncAllReport, duration: Duration) {
    let propagation = &report.propagation;
    if propagation.updated.is_empty() && propagation.failed.is_empty() {
        println!("{}", "All locales are in sync!".green());
    } else {
        println!(
            "{} {} resource(s) updated from {} source resource(s) in {:.2?}",
            "Done:".green(),
            propagation.updated.len(),
            report.sources,
            duration
        );
    }
    if !propagation.skipped_locked.is_empty() {
        println!(
            "{} {} resource(s) being written elsewhere",
            "Skipped".yellow(),
            propagation.skipped_locked.len()
        );
    }
    if report.po_files > 0 {
        println!("{} {} PO file(s)", "Wrote".dimmed(), report.po_files.to_string().cyan());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path_strips_root() {
        let root = Path::new("/project");
        assert_eq!(
            display_path(Path::new("/project/locales/en/common.json"), root),
            "locales/en/common.json"
        );
        assert_eq!(display_path(Path::new("/elsewhere/a.json"), root), "/elsewhere/a.json");
    }
}
