use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Where diagnostic output goes.
#[derive(Debug, Clone, Copy)]
pub enum LogTarget<'a> {
    File(&'a Path),
    Stderr,
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides `default_level`.
pub fn init_tracing(target: LogTarget<'_>, default_level: &str) -> Result<(), Box<dyn Error>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(default_level))
        .with_target(false);

    let installed = match target {
        LogTarget::File(path) => {
            let file = open_log_file(path)
                .map_err(|e| format!("Cannot open log file {}: {e}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        LogTarget::Stderr => builder.with_writer(io::stderr).try_init(),
    };

    installed.map_err(|e| format!("Could not install logger: {e}").into())
}
