// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wraps repository calls with a tracing span recording elapsed time, and
//! logs any call exceeding the configured slow-query threshold.

use std::future::Future;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub slow_query_threshold: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { slow_query_threshold: Duration::from_millis(100) }
    }
}

/// Run `op` under a span named `operation`, logging a warning if it exceeds
/// `config.slow_query_threshold`. `explain` is an optional cost-hint string
/// (e.g. the relational driver's `EXPLAIN QUERY PLAN` output) attached to
/// the slow-query log line only; it is not computed unless the call is slow
/// would require a second round-trip, so callers pass it eagerly only when
/// cheap to obtain.
#[tracing::instrument(skip(op, config), fields(elapsed_ms))]
pub async fn timed<T, E, F, Fut>(operation: &str, config: MonitorConfig, op: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = op().await;
    let elapsed = start.elapsed();
    tracing::Span::current().record("elapsed_ms", elapsed.as_millis() as u64);
    if elapsed >= config.slow_query_threshold {
        tracing::warn!(operation, elapsed_ms = elapsed.as_millis() as u64, "slow storage operation");
    }
    result
}
