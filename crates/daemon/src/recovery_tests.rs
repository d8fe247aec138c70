// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctlplane_core::{OwnerId, Project, Session, SessionStatus, Task, Workspace};
use ctlplane_storage::{SessionRepo, StorageConfig, TaskRepo, WorkspaceRepo};

fn ctx() -> Context {
    Context::background()
}

async fn seeded_running_task(storage: &Engine) -> (ctlplane_core::WorkspaceId, ctlplane_core::TaskId) {
    let workspace = storage
        .repos()
        .workspaces()
        .create(&ctx(), Workspace::new(OwnerId::new(), "demo", "/srv/demo".into(), 1_000))
        .await
        .expect("create workspace");
    let project = storage
        .repos()
        .projects()
        .create(&ctx(), Project::new(workspace.id, "proj", 1_000))
        .await
        .expect("create project");
    let session = storage.repos().sessions().create(&ctx(), Session::new(project.id, 1_000)).await.expect("create session");
    let session = storage.repos().sessions().activate(&ctx(), session.id, "slot-1".into(), 1_000).await.expect("activate");
    let task = storage.repos().tasks().create(&ctx(), Task::new(session.id, "echo hi")).await.expect("create task");
    let task = storage.repos().tasks().start(&ctx(), task.id, 1_000).await.expect("start");
    storage.repos().workspaces().increment_active_tasks(&ctx(), workspace.id, 1_000).await.expect("increment");
    assert_eq!(session.status, SessionStatus::Active);
    (workspace.id, task.id)
}

#[tokio::test]
async fn recover_fails_running_tasks_and_settles_counters() {
    let storage = Engine::open(&StorageConfig::default()).expect("open storage");
    let (workspace_id, task_id) = seeded_running_task(&storage).await;

    let recovered = recover(&storage, 5_000).await.expect("recover");
    assert_eq!(recovered, 1);

    let task = storage.repos().tasks().get_by_id(&ctx(), task_id).await.expect("get task");
    assert_eq!(task.status, ctlplane_core::TaskStatus::Failed);
    assert_eq!(task.failure, Some(ctlplane_core::FailureReason::HostRestarted));

    let workspace = storage.repos().workspaces().get_by_id(&ctx(), workspace_id).await.expect("get workspace");
    assert_eq!(workspace.active_tasks, 0);
}

#[tokio::test]
async fn recover_is_a_no_op_with_no_running_tasks() {
    let storage = Engine::open(&StorageConfig::default()).expect("open storage");
    let recovered = recover(&storage, 5_000).await.expect("recover");
    assert_eq!(recovered, 0);
}
