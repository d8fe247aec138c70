// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctlplane_core::{Context, SystemClock, WorkspaceId};
use ctlplane_isolation::{LaunchSpec, LocalProcessProvider, MountSpec};
use std::sync::Arc;
use std::time::Duration;

fn sleepy_mount() -> (tempfile::TempDir, MountSpec) {
    let dir = tempfile::tempdir().expect("tempdir");
    let spec = MountSpec::new(dir.path(), None).expect("valid spec");
    (dir, spec)
}

fn sleep_launch() -> LaunchSpec {
    LaunchSpec { argv: vec!["sleep".into(), "30".into()], env: Default::default() }
}

fn small_pool(max_sessions: usize) -> Arc<Pool<LocalProcessProvider, SystemClock>> {
    let config = PoolConfig { max_sessions, spawn_timeout: Duration::from_secs(5), ..PoolConfig::default() };
    Arc::new(Pool::new(config, Arc::new(LocalProcessProvider::new()), SystemClock))
}

#[tokio::test]
async fn acquire_spawns_when_pool_has_capacity() {
    let pool = small_pool(4);
    let (_dir, mount) = sleepy_mount();
    let workspace_id = WorkspaceId::new();
    let ctx = Context::with_timeout(Duration::from_secs(5));

    let slot_id = pool.acquire(&ctx, workspace_id, mount, sleep_launch()).await.expect("acquire");
    let stats = pool.stats();
    assert_eq!(stats.busy, 1);
    assert_eq!(stats.total_spawns, 1);

    pool.release(slot_id);
    let stats = pool.stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.busy, 0);
}

#[tokio::test]
async fn released_slot_is_reused_for_same_workspace() {
    let pool = small_pool(4);
    let (_dir, mount) = sleepy_mount();
    let workspace_id = WorkspaceId::new();
    let ctx = Context::with_timeout(Duration::from_secs(5));

    let first = pool.acquire(&ctx, workspace_id, mount.clone(), sleep_launch()).await.expect("acquire");
    pool.release(first);

    let second = pool.acquire(&ctx, workspace_id, mount, sleep_launch()).await.expect("acquire");
    assert_eq!(first, second);
    let stats = pool.stats();
    assert_eq!(stats.total_spawns, 1);
    assert_eq!(stats.total_reuses, 1);
}

#[tokio::test]
async fn acquire_times_out_when_pool_is_full_and_nothing_released() {
    let pool = small_pool(1);
    let (_dir, mount) = sleepy_mount();
    let workspace_id = WorkspaceId::new();
    let other_workspace = WorkspaceId::new();
    let ctx = Context::with_timeout(Duration::from_secs(5));

    let _first = pool.acquire(&ctx, workspace_id, mount.clone(), sleep_launch()).await.expect("acquire");

    let short_ctx = Context::with_timeout(Duration::from_millis(200));
    let result = pool.acquire(&short_ctx, other_workspace, mount, sleep_launch()).await;
    assert!(matches!(result, Err(PoolError::Timeout)));
}

#[tokio::test]
async fn release_drains_slot_when_reuse_disabled() {
    let config = PoolConfig { enable_session_reuse: false, spawn_timeout: Duration::from_secs(5), ..PoolConfig::default() };
    let pool = Arc::new(Pool::new(config, Arc::new(LocalProcessProvider::new()), SystemClock));
    let (_dir, mount) = sleepy_mount();
    let workspace_id = WorkspaceId::new();
    let ctx = Context::with_timeout(Duration::from_secs(5));

    let slot_id = pool.acquire(&ctx, workspace_id, mount, sleep_launch()).await.expect("acquire");
    pool.release(slot_id);

    // Draining happens on a spawned task; give it a moment to run.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let stats = pool.stats();
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn health_tick_fails_slot_whose_process_exited_while_busy() {
    let pool = small_pool(4);
    let dir = tempfile::tempdir().expect("tempdir");
    let spec = MountSpec::new(dir.path(), None).expect("valid spec");
    let workspace_id = WorkspaceId::new();
    let ctx = Context::with_timeout(Duration::from_secs(5));

    let short_lived = LaunchSpec { argv: vec!["true".into()], env: Default::default() };
    let slot_id = pool.acquire(&ctx, workspace_id, spec, short_lived).await.expect("acquire");
    tokio::time::sleep(Duration::from_millis(200)).await;

    pool.health_tick().await;

    let stats = pool.stats();
    assert_eq!(stats.active, 0);
    assert_eq!(*stats.failures_by_kind.get(&ctlplane_core::ErrorKind::ProcessCrashed).unwrap_or(&0), 1);
    let _ = slot_id;
}
