// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff shared by spawn retries and transient storage-error
//! retries. Terminal-state writes use [`RetryPolicy::retry_forever`] instead
//! of a bounded attempt count: a `running` record must never outlive the
//! process that owned it.

use ctlplane_core::{CoreError, CoreResult, ErrorKind};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Spawn retries: `max_spawn_retries` attempts, 100ms * 2^n capped.
    pub fn spawn(max_spawn_retries: u32) -> Self {
        Self {
            max_attempts: Some(max_spawn_retries),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Terminal-state writes retry until they succeed; a `running` record
    /// must never be left behind for a process that's already gone.
    pub fn retry_forever() -> Self {
        Self { max_attempts: None, base_delay: Duration::from_millis(100), max_delay: Duration::from_secs(10) }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        scaled.min(self.max_delay)
    }

    /// Runs `f` until it succeeds, the attempt budget is exhausted, or `f`
    /// returns a non-transient error (those are never retried).
    pub async fn run<T, F, Fut>(&self, mut f: F) -> CoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = CoreResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.kind.is_transient() => return Err(err),
                Err(err) => {
                    let exhausted = self.max_attempts.is_some_and(|max| attempt + 1 >= max);
                    if exhausted {
                        return Err(err);
                    }
                    tracing::warn!(attempt, kind = %err.kind, error = %err.message, "retrying after transient error");
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Surfaces a spawn exhaustion as a stable [`ErrorKind::SpawnFailed`].
pub fn spawn_exhausted(message: impl Into<String>) -> CoreError {
    CoreError::new(ErrorKind::SpawnFailed, message)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
