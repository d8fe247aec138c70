// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool sizing and load-balancing configuration.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalancingStrategy {
    RoundRobin,
    LeastConnections,
    WeightedRoundRobin,
}

impl Default for LoadBalancingStrategy {
    fn default() -> Self {
        LoadBalancingStrategy::LeastConnections
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Hard cap on live slots across the whole pool.
    pub max_sessions: usize,
    /// Keep-warm target per workspace.
    pub min_idle: usize,
    pub max_idle_per_workspace: usize,
    pub session_idle_timeout: Duration,
    /// Summed RSS cap across the pool, probed periodically.
    pub max_memory_bytes: u64,
    pub enable_session_reuse: bool,
    pub load_balancing_strategy: LoadBalancingStrategy,
    pub spawn_timeout: Duration,
    pub graceful_shutdown: Duration,
    pub heartbeat_interval: Duration,
    pub breaker: BreakerConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: 64,
            min_idle: 0,
            max_idle_per_workspace: 4,
            session_idle_timeout: Duration::from_secs(300),
            max_memory_bytes: 8 * 1024 * 1024 * 1024,
            enable_session_reuse: true,
            load_balancing_strategy: LoadBalancingStrategy::default(),
            spawn_timeout: Duration::from_secs(30),
            graceful_shutdown: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(5),
            breaker: BreakerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub window: Duration,
    pub cool_off: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, window: Duration::from_secs(60), cool_off: Duration::from_secs(30) }
    }
}
