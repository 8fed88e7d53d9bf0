// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration
//!
//! Every tunable lives here and can be overridden from a TOML file. Durations
//! use humantime notation (`"6h"`, `"500ms"`). Missing sections fall back to
//! the defaults below.

use crate::mutation::{AllowList, EntityType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Human-readable name stored with the device identity
    pub device_name: Option<String>,
    pub allow_list: AllowList,
    pub queue: QueueConfig,
    pub breaker: BreakerConfig,
    pub dead_letter: DeadLetterConfig,
    pub maintenance: MaintenanceConfig,
    pub reconcile: ReconcileConfig,
    pub remote: RemoteConfig,
}

impl SyncConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.queue.max_attempts == 0, "queue.max_attempts must be at least 1"),
            (self.queue.capacity == 0, "queue.capacity must be at least 1"),
            (
                self.breaker.failure_threshold == 0,
                "breaker.failure_threshold must be at least 1",
            ),
            (
                self.breaker.success_threshold == 0,
                "breaker.success_threshold must be at least 1",
            ),
            (
                self.breaker.half_open_max_calls == 0,
                "breaker.half_open_max_calls must be at least 1",
            ),
            (
                self.queue.drain_interval.is_zero(),
                "queue.drain_interval must be greater than zero",
            ),
            (
                self.reconcile.interval.is_zero(),
                "reconcile.interval must be greater than zero",
            ),
            (
                self.maintenance.dead_letter_interval.is_zero(),
                "maintenance.dead_letter_interval must be greater than zero",
            ),
            (
                self.maintenance.health_check_interval.is_zero(),
                "maintenance.health_check_interval must be greater than zero",
            ),
            (
                self.maintenance.storage_cleanup_interval.is_zero(),
                "maintenance.storage_cleanup_interval must be greater than zero",
            ),
            (
                self.dead_letter.backoff.base > self.dead_letter.backoff.cap,
                "dead_letter.backoff.base must not exceed dead_letter.backoff.cap",
            ),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(ConfigError::Invalid(message.to_string())),
            None => Ok(()),
        }
    }
}

/// What `add_mutation` does when the queue is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Refuse the new mutation
    RejectNew,
    /// Move the oldest queued mutation to the dead letter queue
    #[default]
    EvictOldest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Attempts before a retryable failure is dead-lettered
    pub max_attempts: u32,
    pub capacity: usize,
    pub overflow: OverflowPolicy,
    /// How often the engine loop drains the queue
    #[serde(with = "humantime_serde")]
    pub drain_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            capacity: 10_000,
            overflow: OverflowPolicy::EvictOldest,
            drain_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,
    /// Time the breaker stays open before allowing trial calls
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,
    /// Consecutive half-open successes that close the breaker
    pub success_threshold: u32,
    /// Concurrent trial calls permitted while half-open
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            success_threshold: 2,
            half_open_max_calls: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    #[serde(with = "humantime_serde")]
    pub base: Duration,
    #[serde(with = "humantime_serde")]
    pub cap: Duration,
    #[serde(with = "humantime_serde")]
    pub max_jitter: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            cap: Duration::from_secs(60),
            max_jitter: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadLetterConfig {
    /// Reprocessing attempts before an item is left for archival
    pub max_retries: u32,
    pub backoff: BackoffConfig,
    /// Age after which unresolved items are archived
    #[serde(with = "humantime_serde")]
    pub archive_after: Duration,
    /// Time after archival before an item is deleted
    #[serde(with = "humantime_serde")]
    pub purge_after: Duration,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: BackoffConfig::default(),
            archive_after: Duration::from_secs(30 * DAY),
            purge_after: Duration::from_secs(30 * DAY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    #[serde(with = "humantime_serde")]
    pub dead_letter_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub health_check_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub storage_cleanup_interval: Duration,
    /// How long the breaker may stay open before maintenance resets it
    #[serde(with = "humantime_serde")]
    pub heal_after: Duration,
    /// Age after which `temp:` and `cache:` keys are removed
    #[serde(with = "humantime_serde")]
    pub temp_ttl: Duration,
    pub keep_sync_summaries: usize,
    /// Rewrite the log from current state after storage cleanup
    pub compact_on_cleanup: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            dead_letter_interval: Duration::from_secs(6 * HOUR),
            health_check_interval: Duration::from_secs(DAY),
            storage_cleanup_interval: Duration::from_secs(DAY),
            heal_after: Duration::from_secs(DAY),
            temp_ttl: Duration::from_secs(7 * DAY),
            keep_sync_summaries: 30,
            compact_on_cleanup: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Per-entity overrides of local field name → remote field name
    pub field_mappings: BTreeMap<EntityType, BTreeMap<String, String>>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            field_mappings: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
