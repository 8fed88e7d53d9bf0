// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker guarding remote calls
//!
//! ```text
//! Closed ──(consecutive failures ≥ threshold)──▶ Open
//! Open ──(reset timeout elapsed + allow_request)──▶ HalfOpen
//! HalfOpen ──(success_threshold successes)──▶ Closed
//! HalfOpen ──(any failure)──▶ Open
//! ```

use crate::clock::Clock;
use crate::config::BreakerConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

/// Snapshot of breaker health for telemetry and the healing check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthMetrics {
    pub state: CircuitState,
    /// successes / (successes + failures); 1.0 before any call completed
    pub success_rate: f64,
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_failure_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub since_last_failure: Option<Duration>,
}

/// Circuit breaker state machine
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    half_open_in_flight: u32,
    success_count: u64,
    failure_count: u64,
    last_failure_time: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            half_open_in_flight: 0,
            success_count: 0,
            failure_count: 0,
            last_failure_time: None,
            last_failure_at: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Whether a remote call may be attempted now
    ///
    /// In `Open` this performs the transition to `HalfOpen` once the reset
    /// timeout has elapsed. In `HalfOpen` each `true` consumes one trial slot
    /// until a result is recorded.
    pub fn allow_request(&mut self, clock: &impl Clock) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = self
                    .last_failure_time
                    .map(|t| clock.now().saturating_duration_since(t))
                    .unwrap_or(Duration::MAX);
                if elapsed < self.config.reset_timeout {
                    return false;
                }
                self.state = CircuitState::HalfOpen;
                self.half_open_successes = 0;
                self.half_open_in_flight = 1;
                true
            }
            CircuitState::HalfOpen => {
                if self.half_open_in_flight >= self.config.half_open_max_calls {
                    return false;
                }
                self.half_open_in_flight += 1;
                true
            }
        }
    }

    pub fn record_success(&mut self) {
        self.success_count += 1;
        match self.state {
            CircuitState::Closed => self.consecutive_failures = 0,
            CircuitState::Open => {}
            CircuitState::HalfOpen => {
                self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
                self.half_open_successes += 1;
                if self.half_open_successes >= self.config.success_threshold {
                    self.close();
                }
            }
        }
    }

    pub fn record_failure(&mut self, clock: &impl Clock) {
        self.failure_count += 1;
        self.consecutive_failures += 1;
        self.last_failure_time = Some(clock.now());
        self.last_failure_at = Some(clock.utc_now());
        match self.state {
            CircuitState::Closed => {
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.state = CircuitState::Open;
                }
            }
            CircuitState::Open => {}
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.half_open_successes = 0;
                self.half_open_in_flight = 0;
            }
        }
    }

    /// Release a trial slot without judging the remote
    ///
    /// Used when an attempt was cancelled before it produced a result.
    pub fn record_abandoned(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
        }
    }

    /// Force `Closed` and zero every counter
    pub fn reset(&mut self) {
        self.close();
        self.last_failure_time = None;
        self.last_failure_at = None;
    }

    pub fn health_metrics(&self, clock: &impl Clock) -> HealthMetrics {
        let total = self.success_count + self.failure_count;
        let success_rate = if total == 0 {
            1.0
        } else {
            self.success_count as f64 / total as f64
        };
        HealthMetrics {
            state: self.state,
            success_rate,
            is_healthy: self.state == CircuitState::Closed,
            consecutive_failures: self.consecutive_failures,
            success_count: self.success_count,
            failure_count: self.failure_count,
            last_failure_at: self.last_failure_at,
            since_last_failure: self
                .last_failure_time
                .map(|t| clock.now().saturating_duration_since(t)),
        }
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.half_open_successes = 0;
        self.half_open_in_flight = 0;
        self.success_count = 0;
        self.failure_count = 0;
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
