// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::repo::{Patch, WorkspaceFields};
use ctlplane_core::{FailureReason, SessionStatus, TaskStatus, WorkspaceStatus};

fn ctx() -> Context {
    Context::background()
}

fn open_engine() -> (KvEngine, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = KvEngine::open(dir.path()).expect("open");
    (engine, dir)
}

fn sample_workspace() -> Workspace {
    Workspace::new(OwnerId::new(), "demo", "/srv/demo".into(), 1_000)
}

#[tokio::test]
async fn create_and_get_round_trips() {
    let (engine, _dir) = open_engine();
    let created = WorkspaceRepo::create(&engine, &ctx(), sample_workspace()).await.expect("create");
    let fetched = engine.get_by_id(&ctx(), created.id.clone()).await.expect("get");
    assert_eq!(fetched.name, "demo");
    assert_eq!(fetched.status, WorkspaceStatus::Active);
}

#[tokio::test]
async fn duplicate_owner_and_name_is_rejected() {
    let (engine, _dir) = open_engine();
    let owner = OwnerId::new();
    let mut a = sample_workspace();
    a.owner_id = owner;
    let mut b = sample_workspace();
    b.owner_id = owner;
    WorkspaceRepo::create(&engine, &ctx(), a).await.expect("first insert");
    let err = WorkspaceRepo::create(&engine, &ctx(), b).await.expect_err("second insert should fail");
    assert_eq!(err.kind, ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn update_rejects_stale_version() {
    let (engine, _dir) = open_engine();
    let created = WorkspaceRepo::create(&engine, &ctx(), sample_workspace()).await.expect("create");
    let patch = Patch { expected_version: created.version + 1, fields: WorkspaceFields { name: Some("renamed".into()), status: None } };
    let err = engine.update(&ctx(), created.id, patch).await.expect_err("stale update");
    assert_eq!(err.kind, ErrorKind::VersionMismatch);
}

#[tokio::test]
async fn delete_with_active_tasks_is_rejected() {
    let (engine, _dir) = open_engine();
    let mut workspace = sample_workspace();
    workspace.active_tasks = 1;
    let created = WorkspaceRepo::create(&engine, &ctx(), workspace).await.expect("create");
    let err = engine.delete(&ctx(), created.id).await.expect_err("delete should fail");
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[tokio::test]
async fn soft_deleted_workspace_is_invisible_to_get_and_list() {
    let (engine, _dir) = open_engine();
    let created = WorkspaceRepo::create(&engine, &ctx(), sample_workspace()).await.expect("create");
    engine.delete(&ctx(), created.id.clone()).await.expect("delete");
    let err = engine.get_by_id(&ctx(), created.id).await.expect_err("should be gone");
    assert_eq!(err.kind, ErrorKind::NotFound);
    let listed = engine.list(&ctx(), Paging::default()).await.expect("list");
    assert!(listed.is_empty());
}

#[tokio::test]
async fn reopen_at_same_path_sees_prior_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let engine = KvEngine::open(dir.path()).expect("open");
        WorkspaceRepo::create(&engine, &ctx(), sample_workspace()).await.expect("create");
    }
    let reopened = KvEngine::open(dir.path()).expect("reopen");
    let listed = reopened.list(&ctx(), Paging::default()).await.expect("list");
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn increment_then_decrement_active_tasks_round_trips() {
    let (engine, _dir) = open_engine();
    let created = WorkspaceRepo::create(&engine, &ctx(), sample_workspace()).await.expect("create");
    let bumped = engine.increment_active_tasks(&ctx(), created.id.clone(), 2_000).await.expect("increment");
    assert_eq!(bumped.active_tasks, 1);
    assert_eq!(bumped.version, created.version + 1);
    let settled = engine.decrement_active_tasks(&ctx(), created.id, 3_000).await.expect("decrement");
    assert_eq!(settled.active_tasks, 0);
    assert_eq!(settled.version, created.version + 2);
}

#[tokio::test]
async fn decrement_active_tasks_saturates_at_zero() {
    let (engine, _dir) = open_engine();
    let created = WorkspaceRepo::create(&engine, &ctx(), sample_workspace()).await.expect("create");
    let settled = engine.decrement_active_tasks(&ctx(), created.id, 2_000).await.expect("decrement");
    assert_eq!(settled.active_tasks, 0);
}

#[tokio::test]
async fn register_then_release_session_round_trips() {
    let (engine, _dir) = open_engine();
    let workspace = WorkspaceRepo::create(&engine, &ctx(), sample_workspace()).await.expect("create workspace");
    let project = ProjectRepo::create(&engine, &ctx(), Project::new(workspace.id, "demo", 1_000)).await.expect("create project");
    let registered = engine.register_session(&ctx(), project.id.clone(), 2_000).await.expect("register");
    assert_eq!(registered.live_sessions, 1);
    let released = engine.release_session(&ctx(), project.id, 3_000).await.expect("release");
    assert_eq!(released.live_sessions, 0);
}

async fn seeded_session(engine: &KvEngine) -> Session {
    let workspace = WorkspaceRepo::create(engine, &ctx(), sample_workspace()).await.expect("create workspace");
    let project = ProjectRepo::create(engine, &ctx(), Project::new(workspace.id, "demo", 1_000)).await.expect("create project");
    SessionRepo::create(engine, &ctx(), Session::new(project.id, 1_000)).await.expect("create session")
}

#[tokio::test]
async fn session_fsm_transitions_persist() {
    let (engine, _dir) = open_engine();
    let session = seeded_session(&engine).await;
    let activated = engine.activate(&ctx(), session.id.clone(), "slot-1".into(), 2_000).await.expect("activate");
    assert_eq!(activated.status, SessionStatus::Active);
    let commanded = engine.record_command(&ctx(), session.id.clone(), 2_500).await.expect("record_command");
    assert_eq!(commanded.command_count, 1);
    let idled = engine.go_idle(&ctx(), session.id.clone(), 3_000).await.expect("go_idle");
    assert_eq!(idled.status, SessionStatus::Idle);
    let touched = engine.record_activity(&ctx(), session.id.clone(), 3_500).await.expect("record_activity");
    assert_eq!(touched.last_active_ms, 3_500);
    let ending = engine.begin_end(&ctx(), session.id.clone(), 4_000).await.expect("begin_end");
    assert_eq!(ending.status, SessionStatus::Ending);
    let ended = engine.finish_end(&ctx(), session.id, 4_500).await.expect("finish_end");
    assert_eq!(ended.status, SessionStatus::Ended);
}

#[tokio::test]
async fn session_illegal_transition_is_conflict() {
    let (engine, _dir) = open_engine();
    let session = seeded_session(&engine).await;
    let err = engine.finish_end(&ctx(), session.id, 2_000).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

async fn seeded_task(engine: &KvEngine) -> Task {
    let session = seeded_session(engine).await;
    TaskRepo::create(engine, &ctx(), Task::new(session.id, "echo hi")).await.expect("create task")
}

#[tokio::test]
async fn task_fsm_completes_and_tracks_output() {
    let (engine, _dir) = open_engine();
    let task = seeded_task(&engine).await;
    engine.start(&ctx(), task.id.clone(), 2_000).await.expect("start");
    let with_output = engine.record_output(&ctx(), task.id.clone(), 128).await.expect("record_output");
    assert_eq!(with_output.output_bytes, 128);
    let completed = engine.complete(&ctx(), task.id, 0, 3_000).await.expect("complete");
    assert_eq!(completed.status, TaskStatus::Completed);
    assert_eq!(completed.duration_ms, Some(1_000));
}

#[tokio::test]
async fn task_fail_records_failure_reason() {
    let (engine, _dir) = open_engine();
    let task = seeded_task(&engine).await;
    engine.start(&ctx(), task.id.clone(), 2_000).await.expect("start");
    let failed = engine.fail(&ctx(), task.id, FailureReason::NonZeroExit, Some(1), 2_500).await.expect("fail");
    assert_eq!(failed.failure, Some(FailureReason::NonZeroExit));
}

#[tokio::test]
async fn task_cancel_from_pending_is_conflict() {
    let (engine, _dir) = open_engine();
    let task = seeded_task(&engine).await;
    let err = engine.cancel(&ctx(), task.id, 2_000).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}
