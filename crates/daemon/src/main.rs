// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync Daemon (msd)
//!
//! Background process that owns the mutation queue and drives scheduled
//! sync and maintenance until signalled to stop.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;

use ms_daemon::lifecycle::{self, default_state_dir, Config, DaemonError};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments: msd [state_dir] [config.toml]
    let args: Vec<String> = std::env::args().collect();
    let state_dir = match args.get(1) {
        Some(dir) => PathBuf::from(dir),
        None => default_state_dir()?,
    };
    let mut config = Config::for_state_dir(&state_dir);
    if let Some(path) = args.get(2) {
        config = config.with_config_path(PathBuf::from(path));
    }

    // Write startup marker to log (before tracing setup)
    write_startup_marker(&config)?;

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!("Starting msd in {}", state_dir.display());

    let mut daemon = match lifecycle::startup(&config) {
        Ok(d) => d,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(device_id = %daemon.engine.device().device_id, "Daemon ready");
    println!("READY");

    let cancel = CancellationToken::new();
    {
        let run = daemon.engine.run(&cancel);
        tokio::pin!(run);

        tokio::select! {
            _ = &mut run => {}

            // Graceful shutdown on SIGTERM
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                cancel.cancel();
                run.await;
            }

            // Graceful shutdown on SIGINT
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                cancel.cancel();
                run.await;
            }
        }
    }

    daemon.shutdown();
    info!("Daemon stopped");
    Ok(())
}

/// Startup marker prefix written to log before anything else
/// Full format: "--- msd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- msd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), DaemonError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file
fn write_startup_error(config: &Config, error: &DaemonError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, DaemonError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(DaemonError::NoStateDir)?,
        config.log_path.file_name().ok_or(DaemonError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
