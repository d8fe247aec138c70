// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only pool counters, cloned out from under the pool lock.

use ctlplane_core::ErrorKind;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub active: usize,
    pub idle: usize,
    pub busy: usize,
    pub peak: usize,
    pub total_spawns: u64,
    pub total_reuses: u64,
    pub mean_acquire_latency: Duration,
    pub failures_by_kind: HashMap<ErrorKind, u64>,
}

impl Statistics {
    pub fn reuse_rate(&self) -> f64 {
        let total = self.total_spawns + self.total_reuses;
        if total == 0 {
            0.0
        } else {
            self.total_reuses as f64 / total as f64
        }
    }
}

/// Accumulates the raw counters `Statistics` snapshots are built from.
/// Lives inside the pool's lock; never leaked by reference to callers.
#[derive(Debug, Default)]
pub struct Counters {
    pub peak: usize,
    pub total_spawns: u64,
    pub total_reuses: u64,
    pub acquire_latency_sum: Duration,
    pub acquire_count: u64,
    pub failures_by_kind: HashMap<ErrorKind, u64>,
}

impl Counters {
    pub fn record_acquire_latency(&mut self, latency: Duration) {
        self.acquire_latency_sum += latency;
        self.acquire_count += 1;
    }

    pub fn record_failure(&mut self, kind: ErrorKind) {
        *self.failures_by_kind.entry(kind).or_insert(0) += 1;
    }

    pub fn mean_acquire_latency(&self) -> Duration {
        if self.acquire_count == 0 {
            Duration::ZERO
        } else {
            self.acquire_latency_sum / self.acquire_count as u32
        }
    }
}
