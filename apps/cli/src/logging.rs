//! Tracing setup for the `tune` binary.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install a global subscriber writing to stderr so stdout stays parseable.
pub fn init(log_level: &str) -> anyhow::Result<()> {
    let level = match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
