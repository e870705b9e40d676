//! Tracing setup
//!
//! Every run rewrites `log.txt` in the config directory. Warnings also go to
//! stderr; `--verbose` lowers that to debug. `RUST_LOG` overrides the
//! default filter.

use crate::paths::{self, LOG_FILE};

use anyhow::{Context, Result};
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("mcmu=debug")
        } else {
            EnvFilter::new("mcmu=info")
        }
    })
}

fn console_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    }
}

/// Empty the previous run's log, creating the directory if needed
pub fn prepare_log_file(log_dir: &Path) -> Result<()> {
    paths::ensure_dir(log_dir)?;
    let path = log_dir.join(LOG_FILE);
    std::fs::File::create(&path).with_context(|| format!("Failed to truncate {:?}", path))?;
    Ok(())
}

/// Subscriber stack: file layer when a writer is given, stderr layer always
pub fn build_subscriber(
    verbose: bool,
    file_writer: Option<NonBlocking>,
) -> impl Subscriber + Send + Sync + 'static {
    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
    });

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_level(verbose));

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(file_layer)
        .with(console_layer)
}

/// Install the global subscriber.
///
/// With a `log_dir` the returned guard must be held until exit so buffered
/// lines reach the file. Without one only stderr is used.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let (file_writer, guard) = match log_dir {
        Some(log_dir) => {
            prepare_log_file(log_dir)?;
            let file_appender = rolling::never(log_dir, LOG_FILE);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (Some(non_blocking), Some(guard))
        }
        None => (None, None),
    };

    build_subscriber(verbose, file_writer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(log_dir) = log_dir {
        tracing::debug!("Logging to {:?}", log_dir.join(LOG_FILE));
    }
    Ok(guard)
}
