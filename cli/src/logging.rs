//! Logging setup for the CLI.
//!
//! Engine and CLI events go to stderr through `tracing-subscriber`, so they
//! never mix with the plan printed on stdout by `--dry-run`.

use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. `RUST_LOG` takes precedence over `verbose`.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "backup_engine=debug,project_backup=debug"
    } else {
        "backup_engine=warn,project_backup=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
