use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Installs the stderr subscriber. Warnings are always shown; `verbose`
/// lowers the threshold to debug so per-page and progress events appear.
pub fn init(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    // A subscriber installed earlier (tests, embedding apps) takes precedence.
    let _ = fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_level(true)
        .without_time()
        .try_init();
    Ok(())
}
