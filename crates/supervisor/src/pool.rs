// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pool: acquire/release protocol, spawning, health monitoring, and
//! the per-workspace circuit breaker, wired together.
//!
//! The pool lock (`parking_lot::Mutex<PoolState>`) guards only bookkeeping
//! and is never held across an `.await`; the per-slot process handle sits
//! behind its own `tokio::sync::Mutex` so stdio I/O and graceful shutdown
//! never block a concurrent `acquire`.

use crate::balancer::{self, LoadBalancer};
use crate::breaker::Breaker;
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::slot::{Slot, SlotId, SlotState};
use crate::stats::{Counters, Statistics};
use ctlplane_core::{Clock, Context, ErrorKind, WorkspaceId};
use ctlplane_isolation::{IsolationProvider, LaunchSpec, MountSpec, ProcessState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::Instrument;

struct PoolState {
    slots: HashMap<SlotId, Slot>,
    spawning: usize,
    next_id: u64,
    breakers: HashMap<WorkspaceId, Breaker>,
    counters: Counters,
}

impl PoolState {
    fn live_count(&self) -> usize {
        self.slots.len() + self.spawning
    }

    fn breaker(&mut self, workspace_id: WorkspaceId, config: crate::config::BreakerConfig) -> &mut Breaker {
        self.breakers.entry(workspace_id).or_insert_with(|| Breaker::new(config))
    }

    fn idle_count_for_workspace(&self, workspace_id: WorkspaceId) -> usize {
        self.slots
            .values()
            .filter(|s| s.state == SlotState::Idle && s.workspace_id == workspace_id)
            .count()
    }
}

pub struct Pool<P: IsolationProvider, C: Clock> {
    config: PoolConfig,
    provider: Arc<P>,
    clock: C,
    balancer: Box<dyn LoadBalancer>,
    state: Mutex<PoolState>,
    release_notify: Notify,
}

impl<P: IsolationProvider + 'static, C: Clock + 'static> Pool<P, C> {
    pub fn new(config: PoolConfig, provider: Arc<P>, clock: C) -> Self {
        let balancer = balancer::build(config.load_balancing_strategy);
        Self {
            balancer,
            config,
            provider,
            clock,
            state: Mutex::new(PoolState {
                slots: HashMap::new(),
                spawning: 0,
                next_id: 0,
                breakers: HashMap::new(),
                counters: Counters::default(),
            }),
            release_notify: Notify::new(),
        }
    }

    pub fn stats(&self) -> Statistics {
        let state = self.state.lock();
        let idle = state.slots.values().filter(|s| s.state == SlotState::Idle).count();
        let busy = state.slots.values().filter(|s| s.state == SlotState::Busy).count();
        Statistics {
            active: state.slots.len(),
            idle,
            busy,
            peak: state.counters.peak,
            total_spawns: state.counters.total_spawns,
            total_reuses: state.counters.total_reuses,
            mean_acquire_latency: state.counters.mean_acquire_latency(),
            failures_by_kind: state.counters.failures_by_kind.clone(),
        }
    }

    /// Acquire a slot bound to `workspace_id`, spawning or waiting for a
    /// release as needed. Cancelling `ctx` aborts the wait with `Timeout`.
    pub async fn acquire(
        &self,
        ctx: &Context,
        workspace_id: WorkspaceId,
        mount: MountSpec,
        launch: LaunchSpec,
    ) -> Result<SlotId, PoolError> {
        let span = tracing::info_span!("pool.acquire", workspace_id = %workspace_id);
        async move {
            let start = self.clock.now();
            loop {
                if ctx.is_cancelled() {
                    return Err(PoolError::Timeout);
                }
                if !self.breaker_allows(workspace_id) {
                    self.record_failure(ErrorKind::CircuitOpen);
                    return Err(PoolError::CircuitOpen);
                }
                if let Some(id) = self.try_claim_idle(workspace_id) {
                    self.record_acquire_latency(start);
                    return Ok(id);
                }
                if self.try_reserve() {
                    let result = self.spawn_into(workspace_id, mount.clone(), launch.clone()).await;
                    match result {
                        Ok(id) => {
                            self.breaker_record_success(workspace_id);
                            self.record_acquire_latency(start);
                            return Ok(id);
                        }
                        Err(e) => {
                            self.breaker_record_failure(workspace_id);
                            self.record_failure(e.kind());
                            return Err(e);
                        }
                    }
                }
                let notified = self.release_notify.notified();
                let cancel_token = ctx.token();
                tokio::select! {
                    _ = notified => {}
                    _ = cancel_token.cancelled() => return Err(PoolError::Timeout),
                    _ = wait_deadline(ctx) => return Err(PoolError::Timeout),
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Release a previously acquired slot. Reused into the idle set when
    /// reuse is enabled and the per-workspace idle cap isn't exceeded;
    /// otherwise drained.
    pub fn release(self: &Arc<Self>, slot_id: SlotId) {
        let drain = {
            let mut state = self.state.lock();
            let (workspace_id, slot_state) = match state.slots.get(&slot_id) {
                Some(slot) => (slot.workspace_id, slot.state),
                None => return,
            };
            let keep_idle = self.config.enable_session_reuse
                && slot_state != SlotState::Dead
                && state.idle_count_for_workspace(workspace_id) < self.config.max_idle_per_workspace;
            if keep_idle {
                if let Some(slot) = state.slots.get_mut(&slot_id) {
                    slot.state = SlotState::Idle;
                    slot.last_used = self.clock.now();
                }
                false
            } else {
                true
            }
        };
        if drain {
            self.drain(slot_id);
        }
        self.release_notify.notify_waiters();
    }

    /// Run under the slot's process lock, for stdio access by the stream
    /// hub or for testing. Returns `None` if the slot no longer exists.
    pub async fn with_process<R>(&self, slot_id: SlotId, f: impl FnOnce(&mut ctlplane_isolation::ProcessHandle) -> R) -> Option<R> {
        let process = {
            let state = self.state.lock();
            state.slots.get(&slot_id)?.process.clone()
        };
        let mut guard = process.lock().await;
        Some(f(&mut guard))
    }

    /// Probe a slot's process state directly, outside the health monitor's
    /// own sweep. Used by callers that just awaited the process's stdio
    /// reaching EOF and need to learn the exit code before it shows up on
    /// the next heartbeat tick. Returns `None` if the slot no longer exists.
    pub async fn inspect(&self, slot_id: SlotId) -> Option<ctlplane_isolation::Inspection> {
        let process = {
            let state = self.state.lock();
            state.slots.get(&slot_id)?.process.clone()
        };
        let mut guard = process.lock().await;
        self.provider.inspect(&mut guard).await.ok()
    }

    fn try_claim_idle(&self, workspace_id: WorkspaceId) -> Option<SlotId> {
        let mut state = self.state.lock();
        let candidate = balancer::least_recently_used_idle(
            state.slots.values().filter(|s| s.matches(workspace_id)),
        )?;
        let slot = state.slots.get_mut(&candidate)?;
        slot.state = SlotState::Busy;
        slot.last_used = self.clock.now();
        slot.busy_count_since_start += 1;
        state.counters.total_reuses += 1;
        Some(candidate)
    }

    fn try_reserve(&self) -> bool {
        let mut state = self.state.lock();
        if state.live_count() < self.config.max_sessions {
            state.spawning += 1;
            true
        } else {
            false
        }
    }

    async fn spawn_into(&self, workspace_id: WorkspaceId, mount: MountSpec, launch: LaunchSpec) -> Result<SlotId, PoolError> {
        let result = tokio::time::timeout(self.config.spawn_timeout, async {
            let handle = self.provider.prepare(mount).await?;
            let process = self.provider.launch(&handle, launch).await?;
            Ok::<_, ctlplane_core::CoreError>((handle, process))
        })
        .await;

        let mut state = self.state.lock();
        state.spawning -= 1;
        match result {
            Ok(Ok((mount_handle, process))) => {
                let id = SlotId(state.next_id);
                state.next_id += 1;
                let slot = Slot {
                    id,
                    workspace_id,
                    state: SlotState::Busy,
                    process: Arc::new(tokio::sync::Mutex::new(process)),
                    mount: mount_handle,
                    last_used: self.clock.now(),
                    busy_count_since_start: 1,
                };
                state.slots.insert(id, slot);
                state.counters.total_spawns += 1;
                state.counters.peak = state.counters.peak.max(state.slots.len());
                Ok(id)
            }
            Ok(Err(e)) => Err(PoolError::Isolation(e)),
            Err(_) => Err(PoolError::SpawnFailed(format!(
                "spawn did not become ready within {:?}",
                self.config.spawn_timeout
            ))),
        }
    }

    fn drain(self: &Arc<Self>, slot_id: SlotId) {
        let (process, grace) = {
            let mut state = self.state.lock();
            let Some(slot) = state.slots.get_mut(&slot_id) else { return };
            slot.state = SlotState::Draining;
            (slot.process.clone(), self.config.graceful_shutdown)
        };
        let this = self.clone();
        tokio::spawn(async move {
            let mut guard = process.lock().await;
            if let Err(e) = this.provider.stop(&mut guard, grace).await {
                tracing::warn!(slot_id = slot_id.0, error = %e, "error draining slot");
            }
            drop(guard);
            let mut state = this.state.lock();
            state.slots.remove(&slot_id);
            this.release_notify.notify_waiters();
        });
    }

    /// Attach a task context to an acquired slot: cancelling `ctx` sends
    /// `SIGINT`-equivalent stop, escalating to a forced kill, per the
    /// acquire protocol's step 4.
    pub fn bind_cancellation(self: &Arc<Self>, slot_id: SlotId, ctx: Context) {
        let this = self.clone();
        tokio::spawn(async move {
            ctx.token().cancelled().await;
            let process = {
                let state = this.state.lock();
                state.slots.get(&slot_id).map(|s| s.process.clone())
            };
            let Some(process) = process else { return };
            let mut guard = process.lock().await;
            let _ = this.provider.stop(&mut guard, this.config.graceful_shutdown).await;
        });
    }

    /// Background loop: probes every slot's liveness/RSS, fails crashed
    /// busy slots, and drains idle slots past `session_idle_timeout`.
    /// Runs until `ctx` is cancelled.
    pub async fn run_health_monitor(self: Arc<Self>, ctx: Context) {
        let token = ctx.token();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.heartbeat_interval) => {}
            }
            self.health_tick().await;
        }
    }

    async fn health_tick(self: &Arc<Self>) {
        let snapshot: Vec<(SlotId, WorkspaceId, SlotState, Arc<tokio::sync::Mutex<ctlplane_isolation::ProcessHandle>>, Instant)> = {
            let state = self.state.lock();
            state
                .slots
                .values()
                .map(|s| (s.id, s.workspace_id, s.state, s.process.clone(), s.last_used))
                .collect()
        };
        for (id, workspace_id, slot_state, process, last_used) in snapshot {
            let mut guard = process.lock().await;
            let inspection = match self.provider.inspect(&mut guard).await {
                Ok(i) => i,
                Err(e) => {
                    tracing::warn!(slot_id = id.0, error = %e, "health probe failed");
                    continue;
                }
            };
            drop(guard);
            match (slot_state, inspection.state) {
                (SlotState::Busy, ProcessState::Exited(code)) => {
                    tracing::error!(slot_id = id.0, code, "agent process crashed while busy");
                    self.mark_dead(id);
                    self.breaker_record_failure(workspace_id);
                    self.record_failure(ErrorKind::ProcessCrashed);
                }
                (SlotState::Idle, _) if self.clock.now().duration_since(last_used) >= self.config.session_idle_timeout => {
                    tracing::debug!(slot_id = id.0, "draining idle slot past timeout");
                    self.drain(id);
                }
                _ => {}
            }
        }
    }

    fn mark_dead(self: &Arc<Self>, slot_id: SlotId) {
        {
            let mut state = self.state.lock();
            if let Some(slot) = state.slots.get_mut(&slot_id) {
                slot.state = SlotState::Dead;
            }
        }
        self.drain(slot_id);
    }

    fn breaker_allows(&self, workspace_id: WorkspaceId) -> bool {
        let mut state = self.state.lock();
        let now = self.clock.now();
        let breaker_config = self.config.breaker;
        state.breaker(workspace_id, breaker_config).allow(now)
    }

    fn breaker_record_success(&self, workspace_id: WorkspaceId) {
        let mut state = self.state.lock();
        let breaker_config = self.config.breaker;
        state.breaker(workspace_id, breaker_config).record_success();
    }

    fn breaker_record_failure(&self, workspace_id: WorkspaceId) {
        let mut state = self.state.lock();
        let now = self.clock.now();
        let breaker_config = self.config.breaker;
        state.breaker(workspace_id, breaker_config).record_failure(now);
    }

    fn record_acquire_latency(&self, start: Instant) {
        let mut state = self.state.lock();
        let elapsed = self.clock.now().duration_since(start);
        state.counters.record_acquire_latency(elapsed);
    }

    fn record_failure(&self, kind: ErrorKind) {
        let mut state = self.state.lock();
        state.counters.record_failure(kind);
    }
}

async fn wait_deadline(ctx: &Context) {
    match ctx.deadline() {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
