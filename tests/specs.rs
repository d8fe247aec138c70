// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenarios exercising storage, the supervisor pool, the
//! stream hub, isolation binding, and the lifecycle orchestrator together,
//! the way a caller embedding this crate's programmatic API would.

use ctlplane_core::{Clock, Context, ErrorKind, OwnerId, SessionStatus, SystemClock, TaskStatus};
use ctlplane_daemon::{Orchestrator, OrchestratorConfig};
use ctlplane_isolation::LocalProcessProvider;
use ctlplane_storage::{Engine, RepoBundle, SessionRepo, StorageConfig, TaskRepo};
use ctlplane_stream::{DropPolicy, Hub, HubConfig, Topic};
use ctlplane_supervisor::{Pool, PoolConfig};
use ctlplane_wire::{OutboundMessage, StreamKind};
use std::sync::Arc;
use std::time::Duration;

type TestOrchestrator = Orchestrator<LocalProcessProvider, SystemClock>;

fn orchestrator(launch_argv: Vec<String>, pool_config: PoolConfig) -> Arc<TestOrchestrator> {
    let storage = Engine::open(&StorageConfig::default()).expect("open storage");
    let provider = Arc::new(LocalProcessProvider::new());
    let pool = Arc::new(Pool::new(pool_config, provider, SystemClock));
    let hub = Arc::new(Hub::new(HubConfig::default()));
    let config = OrchestratorConfig { launch_argv, ..Default::default() };
    Arc::new(Orchestrator::new(storage, pool, hub, SystemClock, config))
}

fn default_orchestrator(launch_argv: Vec<String>) -> Arc<TestOrchestrator> {
    orchestrator(launch_argv, PoolConfig { spawn_timeout: Duration::from_secs(5), ..Default::default() })
}

async fn wait_for_terminal(orch: &TestOrchestrator, task_id: ctlplane_core::TaskId) -> ctlplane_core::Task {
    for _ in 0..200 {
        let task = orch.storage().repos().tasks().get_by_id(&Context::background(), task_id).await.expect("get task");
        if task.status.is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("task {task_id} never reached a terminal state");
}

async fn seeded_session(orch: &TestOrchestrator) -> (ctlplane_core::Workspace, ctlplane_core::SessionId) {
    let ctx = Context::background();
    let dir = tempfile::tempdir().expect("tempdir");
    let workspace = orch.create_workspace(&ctx, OwnerId::new(), "demo", dir.path().to_path_buf()).await.expect("create workspace");
    let project = orch.create_project(&ctx, workspace.id, "proj").await.expect("create project");
    let session = orch.create_session(&ctx, project.id).await.expect("create session");
    (workspace, session.id)
}

/// Scenario 1: create workspace/project/session/task, subscribe from the
/// start, and observe the ordered stream followed by the terminal event.
#[tokio::test]
async fn create_and_run_reports_ordered_output_then_terminal() {
    let orch = default_orchestrator(vec!["echo".into()]);
    let ctx = Context::background();
    let (_workspace, session_id) = seeded_session(&orch).await;

    let (_task, task_id) = orch.create_task(&ctx, session_id, "hello").await.expect("create task");
    let subscriber = orch.subscribe_task(task_id, Some(0)).expect("subscribe");

    let mut saw_output = false;
    loop {
        let message = subscriber.recv().await.expect("subscriber closed before terminal arrived");
        match message {
            OutboundMessage::Event(event) => {
                assert_eq!(event.stream, StreamKind::Out);
                assert_eq!(event.payload, "hello\n");
                saw_output = true;
            }
            OutboundMessage::Control(ctlplane_wire::ControlMessage::Terminal { status, exit_code, .. }) => {
                assert_eq!(status, ctlplane_wire::TerminalStatus::Completed);
                assert_eq!(exit_code, Some(0));
                break;
            }
            other => panic!("unexpected message before terminal: {other:?}"),
        }
    }
    assert!(saw_output, "expected at least one stdout line before the terminal event");

    let finished = wait_for_terminal(&orch, task_id).await;
    assert_eq!(finished.status, TaskStatus::Completed);
}

/// Scenario 2: with session reuse enabled (the default), a second task
/// against the same workspace claims the first task's idle slot instead of
/// spawning a new process.
#[tokio::test]
async fn second_task_on_same_workspace_reuses_idle_slot() {
    let orch = default_orchestrator(vec!["echo".into()]);
    let ctx = Context::background();
    let (workspace, session_id) = seeded_session(&orch).await;

    let (_task, task_id) = orch.create_task(&ctx, session_id, "first").await.expect("create task");
    wait_for_terminal(&orch, task_id).await;

    let project = orch.create_project(&ctx, workspace.id, "second-project").await.expect("create project");
    let session2 = orch.create_session(&ctx, project.id).await.expect("create session");
    let (_task2, task2_id) = orch.create_task(&ctx, session2.id, "second").await.expect("create task");
    wait_for_terminal(&orch, task2_id).await;

    let stats = orch.pool().stats();
    assert_eq!(stats.total_spawns, 1);
    assert_eq!(stats.total_reuses, 1);
}

/// Scenario 3: cancelling a long-running task stops the process and settles
/// it as `cancelled`, and the hub closes the topic the same way.
#[tokio::test]
async fn cancel_task_stops_process_and_closes_topic_cancelled() {
    let orch = default_orchestrator(vec!["sleep".into(), "30".into()]);
    let ctx = Context::background();
    let (_workspace, session_id) = seeded_session(&orch).await;

    let (_task, task_id) = orch.create_task(&ctx, session_id, "ignored").await.expect("create task");
    let subscriber = orch.subscribe_task(task_id, Some(0)).expect("subscribe");

    tokio::time::sleep(Duration::from_millis(50)).await;
    orch.cancel_task(&ctx, task_id).await.expect("cancel");

    let finished = wait_for_terminal(&orch, task_id).await;
    assert_eq!(finished.status, TaskStatus::Cancelled);

    let mut saw_cancelled_terminal = false;
    loop {
        let Some(message) = subscriber.recv().await else { break };
        if let OutboundMessage::Control(ctlplane_wire::ControlMessage::Terminal { status, .. }) = message {
            assert_eq!(status, ctlplane_wire::TerminalStatus::Cancelled);
            saw_cancelled_terminal = true;
            break;
        }
    }
    assert!(saw_cancelled_terminal, "expected the topic to deliver a cancelled terminal event");
}

/// Scenario 4: a subscriber that never drains its queue is force-closed
/// once it falls `subscriber_queue` messages behind, under the default
/// `DropPolicy::Close`.
#[tokio::test]
async fn slow_subscriber_is_force_closed_on_overflow() {
    let config = HubConfig { subscriber_queue: 8, drop_policy: DropPolicy::Close, ..Default::default() };
    let topic = Topic::new(ctlplane_core::TaskId::new(), config);
    let subscriber = topic.subscribe(None);

    for i in 0..64 {
        topic.publish_line(StreamKind::Out, format!("line {i}"), "2026-08-01T00:00:00Z".into());
    }

    assert!(subscriber.is_closed(), "subscriber should be force-closed once it falls behind capacity");
}

/// Scenario 5: a task still `running` when the storage engine is reopened
/// (modeling a daemon restart) is recovered as `failed`/`host_restarted`,
/// its session drops to `idle`, and its workspace's `active_tasks` counter
/// is decremented.
#[tokio::test]
async fn crash_recovery_settles_orphaned_running_task() {
    let orch = default_orchestrator(vec!["sleep".into(), "5".into()]);
    let ctx = Context::background();
    let (workspace, session_id) = seeded_session(&orch).await;

    let (_task, task_id) = orch.create_task(&ctx, session_id, "ignored").await.expect("create task");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let task = orch.storage().repos().tasks().get_by_id(&ctx, task_id).await.expect("get task");
    assert_eq!(task.status, TaskStatus::Running, "task should still be running when the restart is simulated");

    let recovered = ctlplane_daemon::recovery::recover(orch.storage(), SystemClock.epoch_ms()).await.expect("recover");
    assert_eq!(recovered, 1);

    let task = orch.storage().repos().tasks().get_by_id(&ctx, task_id).await.expect("get task");
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.failure, Some(ctlplane_core::FailureReason::HostRestarted));

    let session = orch.storage().repos().sessions().get_by_id(&ctx, session_id).await.expect("get session");
    assert_eq!(session.status, SessionStatus::Idle);

    let workspace_after = orch.get_workspace(&ctx, workspace.id).await.expect("get workspace");
    assert_eq!(workspace_after.active_tasks, 0);
}

/// Scenario 6: a workspace pointed at a denied host path is accepted at
/// creation (no mount is validated yet) but rejected as soon as a task
/// tries to bind it.
#[tokio::test]
async fn denied_project_path_rejects_task_creation() {
    let orch = default_orchestrator(vec!["echo".into()]);
    let ctx = Context::background();

    let workspace = orch
        .create_workspace(&ctx, OwnerId::new(), "denied", std::path::PathBuf::from("/etc"))
        .await
        .expect("create workspace");
    let project = orch.create_project(&ctx, workspace.id, "proj").await.expect("create project");
    let session = orch.create_session(&ctx, project.id).await.expect("create session");

    let err = orch.create_task(&ctx, session.id, "hello").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
    assert!(err.message.contains("not permitted"), "expected a deny-list message, got: {}", err.message);
}
