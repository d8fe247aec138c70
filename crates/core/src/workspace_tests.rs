// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_workspace_starts_active_with_version_one() {
    let ws = Workspace::new(OwnerId::new(), "w1", PathBuf::from("/tmp/p"), 1_000);
    assert_eq!(ws.status, WorkspaceStatus::Active);
    assert_eq!(ws.version, 1);
    assert_eq!(ws.active_tasks, 0);
    assert!(!ws.is_deleted());
}

#[test]
fn can_delete_only_when_no_active_tasks() {
    let mut ws = Workspace::builder().build();
    assert!(ws.can_delete());
    ws.increment_active_tasks(2_000);
    assert!(!ws.can_delete());
}

#[test]
fn increment_and_decrement_bump_version_and_timestamp() {
    let mut ws = Workspace::builder().build();
    let v0 = ws.version;
    ws.increment_active_tasks(5_000);
    assert_eq!(ws.active_tasks, 1);
    assert_eq!(ws.updated_at_ms, 5_000);
    assert_eq!(ws.version, v0 + 1);
    ws.decrement_active_tasks(6_000);
    assert_eq!(ws.active_tasks, 0);
    assert_eq!(ws.version, v0 + 2);
}

#[test]
fn decrement_never_underflows() {
    let mut ws = Workspace::builder().active_tasks(0).build();
    ws.decrement_active_tasks(1_000);
    assert_eq!(ws.active_tasks, 0);
}

#[test]
fn status_display_is_snake_case() {
    assert_eq!(WorkspaceStatus::Active.to_string(), "active");
    assert_eq!(WorkspaceStatus::Inactive.to_string(), "inactive");
    assert_eq!(WorkspaceStatus::Archived.to_string(), "archived");
}

#[test]
fn status_round_trips_through_serde() {
    let json = serde_json::to_string(&WorkspaceStatus::Archived).expect("serialize");
    assert_eq!(json, "\"archived\"");
    let back: WorkspaceStatus = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, WorkspaceStatus::Archived);
}
