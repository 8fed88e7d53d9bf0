// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fs2::FileExt;
use ms_adapters::{HttpRemoteApi, TracedRemoteApi, TracingTelemetry, WatchNetworkMonitor};
use ms_core::{ConfigError, SyncConfig, SystemClock, UuidIdGen};
use ms_engine::{EngineDeps, SyncEngine};
use ms_storage::{Store, StoreError};
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable holding the remote API bearer token
pub const TOKEN_ENV: &str = "MS_API_TOKEN";

/// Engine with the concrete adapter types used by the daemon
pub type DaemonEngine = SyncEngine<
    TracedRemoteApi<HttpRemoteApi>,
    WatchNetworkMonitor,
    TracingTelemetry,
    SystemClock,
    UuidIdGen,
>;

/// Daemon paths
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    /// Engine configuration (TOML); defaults apply when it does not exist
    pub config_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    pub wal_path: PathBuf,
}

impl Config {
    pub fn for_state_dir(state_dir: &Path) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            config_path: state_dir.join("config.toml"),
            lock_path: state_dir.join("msd.pid"),
            log_path: state_dir.join("msd.log"),
            wal_path: state_dir.join("wal").join("sync.wal"),
        }
    }

    /// Use an explicit config file instead of `<state_dir>/config.toml`
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = path;
        self
    }
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub engine: DaemonEngine,
}

impl DaemonState {
    /// Release on-disk markers; the store is already durable
    pub fn shutdown(&mut self) {
        info!("Shutting down daemon...");

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        info!("Daemon shutdown complete");
    }
}

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub fn startup(config: &Config) -> Result<DaemonState, DaemonError> {
    match startup_inner(config) {
        Ok(state) => Ok(state),
        Err(e) => {
            cleanup_on_failure(config, &e);
            Err(e)
        }
    }
}

fn startup_inner(config: &Config) -> Result<DaemonState, DaemonError> {
    // 1. Acquire lock file FIRST - one daemon per state directory
    std::fs::create_dir_all(&config.state_dir)?;
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(DaemonError::LockFailed)?;

    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 2. Load configuration BEFORE touching the store (fail fast)
    let sync_config = load_sync_config(&config.config_path)?;

    // 3. Replay the store
    let store = Store::open(&config.wal_path)?;
    {
        let state = store.state();
        info!(
            "Loaded state: {} queued mutations, {} dead letters, {} keys",
            state.queue.len(),
            state.dead_letters.len(),
            state.kv.len()
        );
    }

    // 4. Set up adapters (remote wrapped with tracing for observability)
    let token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
    if token.is_none() {
        warn!("{} not set, remote calls are unauthenticated", TOKEN_ENV);
    }
    let remote = TracedRemoteApi::new(HttpRemoteApi::new(
        sync_config.remote.base_url.clone(),
        sync_config.remote.timeout,
        token,
    ));

    // 5. Create engine
    let engine = SyncEngine::new(
        sync_config,
        EngineDeps {
            remote,
            network: WatchNetworkMonitor::new(true),
            telemetry: TracingTelemetry,
            store: Arc::new(Mutex::new(store)),
        },
        SystemClock,
        UuidIdGen,
    )?;

    info!("Daemon started in {}", config.state_dir.display());

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        engine,
    })
}

/// Read the engine config, falling back to defaults when the file is absent
pub fn load_sync_config(path: &Path) -> Result<SyncConfig, DaemonError> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(SyncConfig::default());
    }
    Ok(SyncConfig::load(path)?)
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config, error: &DaemonError) {
    // Another daemon owns the lock file
    if matches!(error, DaemonError::LockFailed(_)) {
        return;
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Default state directory for msd
pub fn default_state_dir() -> Result<PathBuf, DaemonError> {
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("ms"));
    }

    let home = std::env::var("HOME").map_err(|_| DaemonError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/ms"))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
