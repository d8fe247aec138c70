// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn background_context_has_no_deadline_and_is_not_cancelled() {
    let ctx = Context::background();
    assert!(ctx.deadline().is_none());
    assert!(!ctx.is_cancelled());
}

#[test]
fn with_timeout_expires_after_duration_elapses() {
    let ctx = Context::with_timeout(Duration::from_millis(1));
    std::thread::sleep(Duration::from_millis(10));
    assert!(ctx.is_expired());
    assert!(ctx.is_cancelled());
}

#[test]
fn explicit_cancel_marks_context_cancelled() {
    let ctx = Context::background();
    assert!(!ctx.is_cancelled());
    ctx.cancel();
    assert!(ctx.is_cancelled());
}

#[test]
fn child_with_timeout_inherits_tighter_of_two_deadlines() {
    let parent = Context::with_timeout(Duration::from_secs(10));
    let child = parent.child_with_timeout(Duration::from_millis(1));
    std::thread::sleep(Duration::from_millis(10));
    assert!(child.is_expired());
    assert!(!parent.is_expired());
}

#[test]
fn cancelling_parent_cancels_child_token() {
    let parent = Context::background();
    let child = parent.child_with_timeout(Duration::from_secs(10));
    parent.cancel();
    assert!(child.is_cancelled());
}
