//! CLI command implementations.

mod common;
mod scan;
mod sync;
mod watch;

pub use common::{ProjectArgs, TranslatorKind, load_config};
pub use scan::{ScanArgs, run_scan};
pub use sync::{SyncArgs, run_sync};
pub use watch::{WatchArgs, run_watch};
