// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctlplane_core::Context;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn diff_detects_created_modified_removed() {
    let mut previous = HashMap::new();
    previous.insert(PathBuf::from("/a"), SystemTime::UNIX_EPOCH);
    previous.insert(PathBuf::from("/b"), SystemTime::UNIX_EPOCH);

    let mut current = HashMap::new();
    current.insert(PathBuf::from("/a"), SystemTime::UNIX_EPOCH + Duration::from_secs(1));
    current.insert(PathBuf::from("/c"), SystemTime::UNIX_EPOCH);

    let mut changes = diff(&previous, &current);
    changes.sort_by_key(|c| c.path.clone());

    assert_eq!(changes.len(), 3);
    assert!(changes.iter().any(|c| c.path == PathBuf::from("/a") && c.kind == ChangeKind::Modified));
    assert!(changes.iter().any(|c| c.path == PathBuf::from("/b") && c.kind == ChangeKind::Removed));
    assert!(changes.iter().any(|c| c.path == PathBuf::from("/c") && c.kind == ChangeKind::Created));
}

#[test]
fn scan_excludes_configured_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join(".git")).expect("mkdir");
    std::fs::write(dir.path().join(".git/HEAD"), b"ref: refs/heads/main").expect("write");
    std::fs::write(dir.path().join("main.rs"), b"fn main() {}").expect("write");

    let mut errors = ErrorRing::default();
    let snapshot = scan(dir.path(), &[".git".to_string()], &mut errors);

    assert!(snapshot.keys().any(|p| p.ends_with("main.rs")));
    assert!(!snapshot.keys().any(|p| p.to_string_lossy().contains(".git")));
}

#[tokio::test]
async fn run_detects_a_new_file_and_stops_on_cancel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = Context::with_timeout(Duration::from_millis(300));
    let watcher = Watcher::new(
        dir.path().to_path_buf(),
        WatcherConfig { interval: Duration::from_millis(20), exclude_patterns: vec![] },
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    let dir_path = dir.path().to_path_buf();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        std::fs::write(dir_path.join("new.txt"), b"hello").expect("write");
    });

    watcher
        .run(ctx, move |changes| {
            seen_clone.lock().expect("lock").extend(changes);
        })
        .await;

    writer.await.expect("writer task");
    let changes = seen.lock().expect("lock");
    assert!(changes.iter().any(|c| c.path.ends_with("new.txt")));
}
