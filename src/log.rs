use std::fs::File;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use crate::SeedError;

/// Sets up the tracing subscriber.
///
/// Debug builds print everything at `info` and above from this crate, filtered further by
/// `RUST_LOG`. Release builds only write errors, to `debug.log`.
pub fn setup_tracing() -> Result<(), SeedError> {
    if cfg!(debug_assertions) {
        let filter = EnvFilter::from_default_env()
            .add_directive("none".parse()?)
            .add_directive("seedsync=info".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::NONE)
            .pretty()
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;

        return Ok(());
    }

    let log_file = File::create("debug.log")?;

    tracing_subscriber::fmt::fmt()
        .with_span_events(FmtSpan::NONE)
        .with_max_level(LevelFilter::ERROR)
        .with_writer(log_file)
        .pretty()
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
