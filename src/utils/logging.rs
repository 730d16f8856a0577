//! Logging setup and configuration

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "flashguard.log";

pub struct LoggingGuard {
    pub _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Console plus hourly rolling file under `<output_dir>/logs`. `RUST_LOG` overrides the
/// default `info` filter.
pub fn setup_logging(output_dir: &Path) -> Result<Arc<LoggingGuard>> {
    let file_appender = tracing_appender::rolling::hourly(output_dir.join("logs"), LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_ansi(true)
                .with_level(true)
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_level(true)
                .with_ansi(false)
                .compact()
        )
        .with(filter()?)
        .init();

    Ok(Arc::new(LoggingGuard { _guard: guard }))
}

fn filter() -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    // HTTP client internals are noisy at info
    Ok(EnvFilter::new("info")
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?))
}

pub fn setup_output_directories(output_dir: &Path) -> Result<()> {
    use std::fs;

    fs::create_dir_all(output_dir.join("logs"))?;
    fs::create_dir_all(output_dir.join("opportunities"))?;
    fs::create_dir_all(output_dir.join("trades"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_every_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        setup_output_directories(dir.path()).unwrap();
        for sub in ["logs", "opportunities", "trades"] {
            assert!(dir.path().join(sub).is_dir(), "{sub} missing");
        }
    }
}
