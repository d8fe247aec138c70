// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

async fn prepared(provider: &LocalProcessProvider) -> (tempfile::TempDir, MountHandle) {
    let dir = tempfile::tempdir().expect("tempdir");
    let spec = MountSpec::new(dir.path(), None).expect("valid spec");
    let handle = provider.prepare(spec).await.expect("prepare");
    (dir, handle)
}

#[tokio::test]
async fn launch_and_inspect_running_process() {
    let provider = LocalProcessProvider::new();
    let (_dir, handle) = prepared(&provider).await;

    let mut process = provider
        .launch(&handle, LaunchSpec { argv: vec!["sleep".into(), "5".into()], env: HashMap::new() })
        .await
        .expect("launch");

    let inspection = provider.inspect(&mut process).await.expect("inspect");
    assert_eq!(inspection.state, ProcessState::Running);

    let state = provider.stop(&mut process, Duration::from_secs(2)).await.expect("stop");
    assert!(matches!(state, ProcessState::Exited(_)));
}

#[tokio::test]
async fn launch_rejects_empty_argv() {
    let provider = LocalProcessProvider::new();
    let (_dir, handle) = prepared(&provider).await;

    let result = provider.launch(&handle, LaunchSpec::default()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn inspect_reports_exit_for_short_lived_process() {
    let provider = LocalProcessProvider::new();
    let (_dir, handle) = prepared(&provider).await;

    let mut process = provider
        .launch(&handle, LaunchSpec { argv: vec!["true".into()], env: HashMap::new() })
        .await
        .expect("launch");

    tokio::time::sleep(Duration::from_millis(200)).await;
    let inspection = provider.inspect(&mut process).await.expect("inspect");
    assert!(matches!(inspection.state, ProcessState::Exited(_)));
}
