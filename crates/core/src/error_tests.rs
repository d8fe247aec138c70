// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn transient_kinds_are_marked_transient() {
    assert!(ErrorKind::ConnectionFailed.is_transient());
    assert!(ErrorKind::Timeout.is_transient());
    assert!(ErrorKind::TransactionFailed.is_transient());
    assert!(ErrorKind::SpawnFailed.is_transient());
}

#[test]
fn terminal_kinds_are_not_transient() {
    assert!(!ErrorKind::NotFound.is_transient());
    assert!(!ErrorKind::Internal.is_transient());
    assert!(!ErrorKind::VersionMismatch.is_transient());
}

#[test]
fn display_matches_snake_case_code() {
    assert_eq!(ErrorKind::AlreadyExists.to_string(), "already_exists");
    assert_eq!(ErrorKind::CircuitOpen.to_string(), "circuit_open");
}

#[test]
fn version_mismatch_message_includes_both_versions() {
    let err = CoreError::version_mismatch(3, 5);
    assert_eq!(err.kind, ErrorKind::VersionMismatch);
    assert!(err.message.contains('3'));
    assert!(err.message.contains('5'));
}

#[test]
fn error_display_includes_kind_and_message() {
    let err = CoreError::not_found("workspace wks_abc");
    let rendered = err.to_string();
    assert!(rendered.contains("not_found"));
    assert!(rendered.contains("wks_abc"));
}
