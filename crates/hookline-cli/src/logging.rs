// Logging and verbosity control

use tracing::Level;

/// Tracing level for the CLI flags
pub fn level_for(verbose: bool, quiet: bool) -> Level {
    if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::WARN
    }
}

/// Initialize logging based on CLI flags
///
/// Logs go to stderr so stdout stays parseable with `--format json`.
pub fn init_logging(verbose: bool, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level_for(verbose, quiet))
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}
