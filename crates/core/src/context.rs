// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation context threaded through every externally reachable
//! operation: a deadline plus a cooperative cancel signal.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Carries a deadline and a cancel signal through repository calls, pool
/// acquires, and stream subscriptions. Suspension only happens at explicit
/// I/O; a context never blocks lock acquisition.
#[derive(Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Context {
    /// A context with no deadline, parented to a fresh cancel token.
    pub fn background() -> Self {
        Self { deadline: None, cancel: CancellationToken::new() }
    }

    /// A context that becomes cancelled automatically after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { deadline: Some(Instant::now() + timeout), cancel: CancellationToken::new() }
    }

    /// Derive a child context sharing this context's cancellation but with
    /// a tighter deadline if `timeout` is sooner than the parent's.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => Some(existing),
            _ => Some(candidate),
        };
        Self { deadline, cancel: self.cancel.child_token() }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.is_expired()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
