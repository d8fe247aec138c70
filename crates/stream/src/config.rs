// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// What a subscriber's queue does when it falls behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPolicy {
    /// Evict the oldest queued message and merge a `dropped: N` marker
    /// into the next delivered event.
    DropOldest,
    /// Force-close the subscriber with `SlowConsumer`.
    Close,
}

impl Default for DropPolicy {
    fn default() -> Self {
        DropPolicy::Close
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub ring_capacity: usize,
    pub ring_byte_limit: usize,
    pub subscriber_queue: usize,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub drop_policy: DropPolicy,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 10_000,
            ring_byte_limit: 4 * 1024 * 1024,
            subscriber_queue: 256,
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(45),
            drop_policy: DropPolicy::Close,
        }
    }
}
