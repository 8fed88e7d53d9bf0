// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer-based scheduling for periodic engine tasks

use ms_core::{Clock, SyncConfig};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::{Duration, Instant};

/// Periodic work driven by the engine loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduledTask {
    /// Push queued mutations to the remote
    Drain,
    DeadLetterMaintenance,
    HealthCheck,
    StorageCleanup,
    Reconcile,
}

impl fmt::Display for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScheduledTask::Drain => "drain",
            ScheduledTask::DeadLetterMaintenance => "dead_letter_maintenance",
            ScheduledTask::HealthCheck => "health_check",
            ScheduledTask::StorageCleanup => "storage_cleanup",
            ScheduledTask::Reconcile => "reconcile",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledItem {
    pub task: ScheduledTask,
    pub fire_at: Instant,
    pub interval: Duration,
    seq: u64,
}

impl PartialEq for ScheduledItem {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for ScheduledItem {}

impl PartialOrd for ScheduledItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap: earliest first, then insertion order
        Reverse((self.fire_at, self.seq)).cmp(&Reverse((other.fire_at, other.seq)))
    }
}

#[derive(Default)]
pub struct Scheduler {
    items: BinaryHeap<ScheduledItem>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_repeating(&mut self, task: ScheduledTask, fire_at: Instant, interval: Duration) {
        self.next_seq += 1;
        self.items.push(ScheduledItem {
            task,
            fire_at,
            interval,
            seq: self.next_seq,
        });
    }

    /// Items due at or before `now`
    ///
    /// Each item fires at most once per call. One that fell several
    /// intervals behind is rescheduled one interval after `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<ScheduledItem> {
        let mut ready = Vec::new();
        let mut rescheduled = Vec::new();

        while self.items.peek().is_some_and(|item| item.fire_at <= now) {
            let Some(item) = self.items.pop() else {
                break;
            };

            let mut fire_at = item.fire_at + item.interval;
            if fire_at <= now {
                fire_at = now + item.interval;
            }
            rescheduled.push(ScheduledItem {
                fire_at,
                ..item.clone()
            });
            ready.push(item);
        }

        for mut item in rescheduled {
            self.next_seq += 1;
            item.seq = self.next_seq;
            self.items.push(item);
        }
        ready
    }

    /// Schedule every periodic task at its configured interval
    pub fn init_from_config(&mut self, config: &SyncConfig, clock: &impl Clock) {
        let now = clock.now();
        let periodic = [
            (ScheduledTask::Drain, config.queue.drain_interval),
            (ScheduledTask::Reconcile, config.reconcile.interval),
            (
                ScheduledTask::DeadLetterMaintenance,
                config.maintenance.dead_letter_interval,
            ),
            (ScheduledTask::HealthCheck, config.maintenance.health_check_interval),
            (
                ScheduledTask::StorageCleanup,
                config.maintenance.storage_cleanup_interval,
            ),
        ];
        for (task, interval) in periodic {
            self.schedule_repeating(task, now + interval, interval);
        }
    }

    pub fn next_fire_time(&self) -> Option<Instant> {
        self.items.peek().map(|item| item.fire_at)
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
