//! Logging initialization
//!
//! Two sinks, mirroring the provisioning UX contract: a durable,
//! append-only, owner-only-readable installer log that receives full
//! command transcripts at debug level, and stderr for the interactive
//! operator at a verbosity they choose. Failures show up on both.

use crate::error::Result;
use std::fs::{self, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map `-v`/`--quiet` onto an env filter, honoring `RUST_LOG` overrides
fn stderr_filter(verbose: u8, quiet: bool) -> EnvFilter {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize tracing with a stderr layer and, when `log_file` is
/// given, a durable debug-level file layer.
///
/// The log file is opened append-only with mode 0600; its parent
/// directory is created if missing. Must be called once per process.
pub fn init(log_file: Option<&Path>, verbose: u8, quiet: bool) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter(verbose, quiet));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .mode(0o600)
                .open(path)?;
            let file_layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .with_filter(LevelFilter::DEBUG);

            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .init();
        }
        None => {
            tracing_subscriber::registry().with(stderr_layer).init();
        }
    }

    Ok(())
}
