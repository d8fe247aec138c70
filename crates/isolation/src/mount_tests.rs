// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn rejects_missing_path() {
    let result = validate_source(Path::new("/no/such/workspace/root"));
    assert!(result.is_err());
}

#[test]
fn rejects_denied_root() {
    let result = validate_source(Path::new("/etc"));
    assert!(result.is_err());
}

#[test]
fn accepts_valid_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let resolved = validate_source(dir.path()).expect("accepted");
    assert_eq!(resolved, dir.path().canonicalize().expect("canonicalize"));
}

#[test]
fn rejects_file_as_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file_path = dir.path().join("not-a-dir");
    std::fs::write(&file_path, b"hi").expect("write");
    assert!(validate_source(&file_path).is_err());
}

#[test]
fn mount_spec_defaults_target_to_workspace() {
    let dir = tempfile::tempdir().expect("tempdir");
    let spec = MountSpec::new(dir.path(), None).expect("valid spec");
    assert_eq!(spec.target, PathBuf::from("/workspace"));
    assert!(!spec.exclude_patterns.is_empty());
}

#[test]
fn mount_spec_rejects_denied_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = MountSpec::new(dir.path(), Some(PathBuf::from("/etc")));
    assert!(result.is_err());
}
