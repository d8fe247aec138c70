// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_session_starts_pending() {
    let s = Session::new(ProjectId::new(), 1_000);
    assert_eq!(s.status, SessionStatus::Pending);
    assert!(s.process_id.is_none());
}

#[test]
fn activate_from_pending_sets_process_and_started_at() {
    let mut s = Session::builder().build();
    s.activate("slot-1", 2_000).expect("activate");
    assert_eq!(s.status, SessionStatus::Active);
    assert_eq!(s.process_id.as_deref(), Some("slot-1"));
    assert_eq!(s.started_at_ms, Some(2_000));
}

#[test]
fn activate_is_idempotent_while_already_active() {
    let mut s = Session::builder().status(SessionStatus::Active).build();
    assert!(s.activate("slot-2", 3_000).is_ok());
}

#[test]
fn activate_from_ended_is_illegal() {
    let mut s = Session::builder().status(SessionStatus::Ended).build();
    let err = s.activate("slot-1", 1_000).unwrap_err();
    assert_eq!(err, IllegalTransition { from: SessionStatus::Ended, to: SessionStatus::Active });
}

#[test]
fn go_idle_clears_process_id() {
    let mut s = Session::builder().status(SessionStatus::Active).process_id(Some("slot-1".to_string())).build();
    s.go_idle(4_000).expect("go idle");
    assert_eq!(s.status, SessionStatus::Idle);
    assert!(s.process_id.is_none());
}

#[test]
fn go_idle_from_pending_is_illegal() {
    let mut s = Session::builder().build();
    assert!(s.go_idle(1_000).is_err());
}

#[test]
fn active_idle_cycle_reactivates() {
    let mut s = Session::builder().build();
    s.activate("slot-1", 1_000).expect("activate");
    s.go_idle(2_000).expect("idle");
    s.activate("slot-2", 3_000).expect("reactivate");
    assert_eq!(s.status, SessionStatus::Active);
    assert_eq!(s.process_id.as_deref(), Some("slot-2"));
}

#[test]
fn record_command_increments_count() {
    let mut s = Session::builder().build();
    s.record_command(1_000);
    s.record_command(2_000);
    assert_eq!(s.command_count, 2);
    assert_eq!(s.last_active_ms, 2_000);
}

#[test]
fn record_activity_bumps_clock_without_counting_a_command() {
    let mut s = Session::builder().build();
    s.record_activity(5_000);
    assert_eq!(s.command_count, 0);
    assert_eq!(s.last_active_ms, 5_000);
}

#[test]
fn begin_end_then_finish_end_reaches_ended() {
    let mut s = Session::builder().status(SessionStatus::Active).build();
    s.begin_end(5_000).expect("begin end");
    assert_eq!(s.status, SessionStatus::Ending);
    s.finish_end(6_000).expect("finish end");
    assert_eq!(s.status, SessionStatus::Ended);
    assert_eq!(s.ended_at_ms, Some(6_000));
    assert!(s.is_terminal());
}

#[test]
fn begin_end_from_ended_is_illegal() {
    let mut s = Session::builder().status(SessionStatus::Ended).build();
    assert!(s.begin_end(1_000).is_err());
}

#[test]
fn finish_end_without_begin_end_is_illegal() {
    let mut s = Session::builder().build();
    assert!(s.finish_end(1_000).is_err());
}
