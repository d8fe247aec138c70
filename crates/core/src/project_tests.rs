// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_project_has_no_live_sessions() {
    let p = Project::new(WorkspaceId::new(), "p1", 1_000);
    assert_eq!(p.live_sessions, 0);
    assert!(p.can_delete());
}

#[test]
fn register_and_release_session_tracks_liveness() {
    let mut p = Project::builder().build();
    p.register_session(2_000);
    assert_eq!(p.live_sessions, 1);
    assert!(!p.can_delete());
    p.release_session(3_000);
    assert_eq!(p.live_sessions, 0);
    assert!(p.can_delete());
}

#[test]
fn release_never_underflows() {
    let mut p = Project::builder().build();
    p.release_session(1_000);
    assert_eq!(p.live_sessions, 0);
}

#[test]
fn mutation_bumps_version() {
    let mut p = Project::builder().build();
    let v0 = p.version;
    p.register_session(2_000);
    assert_eq!(p.version, v0 + 1);
}
