// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff with jitter for dead letter reprocessing

use crate::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;

/// Delay before reprocessing attempt `attempt` (0-indexed)
///
/// `min(base * 2^attempt, cap) + uniform(0..=max_jitter)`. Jitter only needs
/// a fast PRNG.
pub fn backoff_delay(config: &BackoffConfig, attempt: u32, rng: &mut impl Rng) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    let exponential = config.base.saturating_mul(factor).min(config.cap);
    exponential + jitter(config.max_jitter, rng)
}

fn jitter(max: Duration, rng: &mut impl Rng) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng.gen_range(0..=max_ms))
}
