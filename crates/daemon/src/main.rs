// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ctld`: boots the control plane's storage, supervisor pool, and stream
//! hub behind one orchestrator. No YAML/env config loading and no
//! HTTP/WebSocket surface here — both are wired in by a caller that embeds
//! this crate's programmatic API.

use ctlplane_core::{Clock, Context, SystemClock};
use ctlplane_daemon::{Orchestrator, OrchestratorConfig};
use ctlplane_isolation::LocalProcessProvider;
use ctlplane_storage::{Engine, StorageConfig};
use ctlplane_stream::{Hub, HubConfig};
use ctlplane_supervisor::{Pool, PoolConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let storage = Engine::open(&StorageConfig::default())?;
    let provider = Arc::new(LocalProcessProvider::new());
    let pool = Arc::new(Pool::new(PoolConfig::default(), provider, SystemClock));
    let hub = Arc::new(Hub::new(HubConfig::default()));

    let orchestrator = Arc::new(Orchestrator::new(storage, Arc::clone(&pool), Arc::clone(&hub), SystemClock, OrchestratorConfig::default()));

    let recovered = ctlplane_daemon::recovery::recover(orchestrator.storage(), SystemClock.epoch_ms()).await?;
    tracing::info!(recovered, "control plane ready");

    let sweeper_ctx = Context::background();
    let sweeper = tokio::spawn(Arc::clone(&orchestrator).run_idle_sweeper(sweeper_ctx.clone()));
    let monitor_ctx = Context::background();
    let monitor = tokio::spawn(Arc::clone(&pool).run_health_monitor(monitor_ctx.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    sweeper_ctx.cancel();
    monitor_ctx.cancel();
    let _ = sweeper.await;
    let _ = monitor.await;

    Ok(())
}
