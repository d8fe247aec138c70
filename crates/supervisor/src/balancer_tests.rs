// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::slot::{SlotState};
use ctlplane_core::WorkspaceId;
use ctlplane_isolation::{LocalProcessProvider, MountSpec, IsolationProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

async fn dummy_slot(id: u64, workspace_id: WorkspaceId, busy_count: u64, last_used: Instant) -> Slot {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = LocalProcessProvider::new();
    let spec = MountSpec::new(dir.path(), None).expect("spec");
    let mount = provider.prepare(spec).await.expect("prepare");
    let process = provider
        .launch(&mount, ctlplane_isolation::LaunchSpec { argv: vec!["sleep".into(), "5".into()], env: Default::default() })
        .await
        .expect("launch");
    Slot {
        id: SlotId(id),
        workspace_id,
        state: SlotState::Busy,
        process: Arc::new(Mutex::new(process)),
        mount,
        last_used,
        busy_count_since_start: busy_count,
    }
}

#[tokio::test]
async fn least_connections_picks_lowest_busy_count() {
    let workspace_id = WorkspaceId::new();
    let now = Instant::now();
    let a = dummy_slot(1, workspace_id, 10, now).await;
    let b = dummy_slot(2, workspace_id, 2, now).await;
    let candidates: Vec<&Slot> = vec![&a, &b];

    let balancer = LeastConnections;
    let picked = balancer.select(&candidates).expect("a pick");
    assert_eq!(picked.id, SlotId(2));
}

#[tokio::test]
async fn round_robin_cycles_through_candidates() {
    let workspace_id = WorkspaceId::new();
    let now = Instant::now();
    let a = dummy_slot(1, workspace_id, 0, now).await;
    let b = dummy_slot(2, workspace_id, 0, now).await;
    let candidates: Vec<&Slot> = vec![&a, &b];

    let balancer = RoundRobin::default();
    let first = balancer.select(&candidates).expect("pick").id;
    let second = balancer.select(&candidates).expect("pick").id;
    assert_ne!(first, second);
}

#[tokio::test]
async fn least_recently_used_idle_picks_oldest() {
    let workspace_id = WorkspaceId::new();
    let now = Instant::now();
    let old = now - std::time::Duration::from_secs(60);
    let mut a = dummy_slot(1, workspace_id, 0, now).await;
    a.state = SlotState::Idle;
    let mut b = dummy_slot(2, workspace_id, 0, old).await;
    b.state = SlotState::Idle;
    let slots = vec![a, b];

    let picked = least_recently_used_idle(slots.iter()).expect("pick");
    assert_eq!(picked, SlotId(2));
}
