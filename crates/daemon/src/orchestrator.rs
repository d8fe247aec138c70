// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ties storage, the supervisor pool, and the stream hub into the
//! workspace/project/session/task lifecycle. Every externally reachable
//! operation lands here; the HTTP/WS layer that would call it is out of
//! scope for this crate.

use crate::retry::RetryPolicy;
use ctlplane_core::{
    Clock, Context, CoreError, CoreResult, FailureReason, OwnerId, Project, ProjectId, Session,
    SessionId, Task, TaskId, Workspace, WorkspaceId,
};
use ctlplane_isolation::{IsolationProvider, LaunchSpec, MountSpec, ProcessState};
use ctlplane_storage::{
    Engine, Paging, Patch, ProjectFields, ProjectRepo, RepoBundle, SessionRepo, TaskRepo,
    WorkspaceFields, WorkspaceRepo,
};
use ctlplane_stream::{Hub, Subscriber, Topic};
use ctlplane_supervisor::{Pool, SlotId};
use ctlplane_wire::TerminalStatus;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Knobs this crate owns directly (no YAML/env loading here — a caller
/// builds one of these, typically from `Default`, the way `ctld` does).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Bounded spawn retries, 100ms * 2^n capped, before a task create
    /// fails outright.
    pub max_spawn_retries: u32,
    /// Argv prefix every task launches with; the command is appended as
    /// the final argument.
    pub launch_argv: Vec<String>,
    /// A session with no task activity for this long is swept to `idle`.
    pub inactivity_timeout: Duration,
    pub idle_sweep_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_spawn_retries: 3,
            launch_argv: vec!["claude".into(), "--print".into()],
            inactivity_timeout: Duration::from_secs(600),
            idle_sweep_interval: Duration::from_secs(30),
        }
    }
}

fn launch_spec(config: &OrchestratorConfig, command: &str) -> LaunchSpec {
    let mut argv = config.launch_argv.clone();
    argv.push(command.to_string());
    LaunchSpec { argv, env: HashMap::new() }
}

fn terminal_status_for(status: ctlplane_core::TaskStatus) -> TerminalStatus {
    use ctlplane_core::TaskStatus::*;
    match status {
        Completed => TerminalStatus::Completed,
        Cancelled => TerminalStatus::Cancelled,
        _ => TerminalStatus::Failed,
    }
}

fn failure_text(reason: &FailureReason) -> String {
    match reason {
        FailureReason::NonZeroExit => "non-zero exit".to_string(),
        FailureReason::ProcessCrashed => "process crashed".to_string(),
        FailureReason::ParseError { detail } => format!("parse error: {detail}"),
        FailureReason::HostRestarted => "host restarted".to_string(),
    }
}

/// Owns one of each subsystem and drives `create_task`/`cancel_task`/
/// `close_session` per the data flow. Storage writes commit one at a time,
/// not as a group, so multi-step operations (`create_task`, `create_session`,
/// `terminate_session`) explicitly compensate for a failure partway through
/// by undoing the steps that already committed.
pub struct Orchestrator<P: IsolationProvider + 'static, C: Clock + 'static> {
    storage: Engine<C>,
    pool: Arc<Pool<P, C>>,
    hub: Arc<Hub>,
    clock: C,
    config: OrchestratorConfig,
    /// Per-task cancel handle, live for as long as the task is running.
    /// `cancel_task` looks a task up here and cancels its token; the
    /// finishing task removes the entry once it observes the exit.
    running: Mutex<HashMap<TaskId, Context>>,
}

impl<P: IsolationProvider + 'static, C: Clock + 'static> Orchestrator<P, C> {
    pub fn new(storage: Engine<C>, pool: Arc<Pool<P, C>>, hub: Arc<Hub>, clock: C, config: OrchestratorConfig) -> Self {
        Self { storage, pool, hub, clock, config, running: Mutex::new(HashMap::new()) }
    }

    pub fn storage(&self) -> &Engine<C> {
        &self.storage
    }

    pub fn pool(&self) -> &Arc<Pool<P, C>> {
        &self.pool
    }

    // -- Workspace -----------------------------------------------------

    pub async fn create_workspace(&self, ctx: &Context, owner_id: OwnerId, name: impl Into<String>, project_path: PathBuf) -> CoreResult<Workspace> {
        let now = self.clock.epoch_ms();
        self.storage.repos().workspaces().create(ctx, Workspace::new(owner_id, name, project_path, now)).await
    }

    pub async fn get_workspace(&self, ctx: &Context, id: WorkspaceId) -> CoreResult<Workspace> {
        self.storage.repos().workspaces().get_by_id(ctx, id).await
    }

    pub async fn list_workspaces(&self, ctx: &Context, owner_id: OwnerId, paging: Paging) -> CoreResult<Vec<Workspace>> {
        self.storage.repos().workspaces().get_by_owner(ctx, owner_id, paging).await
    }

    pub async fn update_workspace(&self, ctx: &Context, id: WorkspaceId, patch: Patch<WorkspaceFields>) -> CoreResult<Workspace> {
        self.storage.repos().workspaces().update(ctx, id, patch).await
    }

    pub async fn delete_workspace(&self, ctx: &Context, id: WorkspaceId) -> CoreResult<()> {
        self.storage.repos().workspaces().delete(ctx, id).await
    }

    // -- Project ---------------------------------------------------------

    pub async fn create_project(&self, ctx: &Context, workspace_id: WorkspaceId, name: impl Into<String>) -> CoreResult<Project> {
        let now = self.clock.epoch_ms();
        self.storage.repos().projects().create(ctx, Project::new(workspace_id, name, now)).await
    }

    pub async fn get_project(&self, ctx: &Context, id: ProjectId) -> CoreResult<Project> {
        self.storage.repos().projects().get_by_id(ctx, id).await
    }

    pub async fn list_projects(&self, ctx: &Context, workspace_id: WorkspaceId, paging: Paging) -> CoreResult<Vec<Project>> {
        self.storage.repos().projects().get_by_workspace(ctx, workspace_id, paging).await
    }

    pub async fn update_project(&self, ctx: &Context, id: ProjectId, patch: Patch<ProjectFields>) -> CoreResult<Project> {
        self.storage.repos().projects().update(ctx, id, patch).await
    }

    // -- Session ---------------------------------------------------------

    pub async fn create_session(&self, ctx: &Context, project_id: ProjectId) -> CoreResult<Session> {
        let now = self.clock.epoch_ms();
        let session = self.storage.repos().sessions().create(ctx, Session::new(project_id, now)).await?;
        if let Err(err) = self.storage.repos().projects().register_session(ctx, project_id, now).await {
            if let Err(cleanup_err) = self.storage.repos().sessions().delete(ctx, session.id).await {
                tracing::error!(session_id = %session.id, error = %cleanup_err, "failed to undo session row after register_session failed");
            }
            return Err(err);
        }
        Ok(session)
    }

    pub async fn record_activity(&self, ctx: &Context, id: SessionId) -> CoreResult<Session> {
        let now = self.clock.epoch_ms();
        self.storage.repos().sessions().record_activity(ctx, id, now).await
    }

    /// Explicit close: `any -> ending -> ended`, then releasing the owning
    /// project's `live_sessions` counter as a separate commit. Any
    /// supervisor slot still bound to the session is drained first. If the
    /// counter release fails, the session is already `ended`; the failure
    /// is surfaced rather than retried here.
    pub async fn terminate_session(&self, ctx: &Context, id: SessionId) -> CoreResult<Session> {
        let session = self.storage.repos().sessions().get_by_id(ctx, id).await?;
        if let Some(slot_id) = session.process_id.as_deref().and_then(parse_slot_id) {
            self.pool.release(slot_id);
        }
        let now = self.clock.epoch_ms();
        self.storage.repos().sessions().begin_end(ctx, id, now).await?;
        let session = self.storage.repos().sessions().finish_end(ctx, id, now).await?;
        if let Err(err) = self.storage.repos().projects().release_session(ctx, session.project_id, now).await {
            tracing::error!(session_id = %id, project_id = %session.project_id, error = %err, "session ended but its project's live_sessions counter was not released");
            return Err(err);
        }
        Ok(session)
    }

    // -- Task --------------------------------------------------------------

    /// Resolve the session's project and workspace, acquire a supervisor
    /// slot (retrying bounded spawn failures), create and start the task
    /// row, flip the session active, and bump the workspace's running
    /// count, all before returning. The spawned process's stdio is then
    /// drained in the background by `finish_task`.
    pub async fn create_task(self: &Arc<Self>, ctx: &Context, session_id: SessionId, command: impl Into<String>) -> CoreResult<(Task, TaskId)> {
        let command = command.into();
        let session = self.storage.repos().sessions().get_by_id(ctx, session_id).await?;
        let project = self.storage.repos().projects().get_by_id(ctx, session.project_id).await?;
        let workspace = self.storage.repos().workspaces().get_by_id(ctx, project.workspace_id).await?;
        let workspace_id = workspace.id;

        let mount = MountSpec::new(&workspace.project_path, None)?;
        let launch = launch_spec(&self.config, &command);

        let policy = RetryPolicy::spawn(self.config.max_spawn_retries);
        let slot_id = policy
            .run(|| async {
                self.pool
                    .acquire(ctx, workspace_id, mount.clone(), launch.clone())
                    .await
                    .map_err(|e| e.into_core_error())
            })
            .await?;

        let now = self.clock.epoch_ms();
        let process_id = slot_id.0.to_string();

        // Activate the session before creating the task row: if the session
        // is `ending`/`ended`, this fails and no task row ever exists, so
        // there's nothing to undo. The reverse order (task first, activate
        // second) can commit a `running` task row against a session that
        // then fails to activate, leaking it.
        if let Err(err) = self.storage.repos().sessions().activate(ctx, session_id, process_id, now).await {
            self.pool.release(slot_id);
            return Err(err);
        }

        let task = match self.create_and_start_task(ctx, session_id, workspace_id, command, now).await {
            Ok(task) => task,
            Err(err) => {
                self.revert_session_activation(ctx, session_id, now).await;
                self.pool.release(slot_id);
                return Err(err);
            }
        };

        let topic = self.hub.create_topic(task.id);
        let task_ctx = Context::background();
        self.running.lock().insert(task.id, task_ctx.clone());
        self.pool.bind_cancellation(slot_id, task_ctx.clone());

        let this = Arc::clone(self);
        let task_id = task.id;
        tokio::spawn(async move { this.finish_task(task_id, slot_id, workspace_id, task_ctx, topic).await });

        Ok((task, task_id))
    }

    /// Create the task row, start it, and bump the workspace's running
    /// count. If the counter bump fails (the workspace was deleted out from
    /// under an in-flight task create), the task is cancelled rather than
    /// left `running` with no supervisor attached to it.
    async fn create_and_start_task(&self, ctx: &Context, session_id: SessionId, workspace_id: WorkspaceId, command: String, now: u64) -> CoreResult<Task> {
        let task = self.storage.repos().tasks().create(ctx, Task::new(session_id, command)).await?;
        let task = self.storage.repos().tasks().start(ctx, task.id, now).await?;
        if let Err(err) = self.storage.repos().workspaces().increment_active_tasks(ctx, workspace_id, now).await {
            if let Err(cancel_err) = self.storage.repos().tasks().cancel(ctx, task.id, now).await {
                tracing::error!(task_id = %task.id, error = %cancel_err, "failed to cancel task after workspace counter update failed");
            }
            return Err(err);
        }
        Ok(task)
    }

    /// Best-effort undo of `sessions().activate`, used when a later step of
    /// `create_task` fails. Session transitions commit individually, so this
    /// is a separate call rather than part of any rollback.
    async fn revert_session_activation(&self, ctx: &Context, session_id: SessionId, now: u64) {
        if let Err(err) = self.storage.repos().sessions().go_idle(ctx, session_id, now).await {
            tracing::error!(%session_id, error = %err, "failed to revert session activation after task setup failed");
        }
    }

    /// Drains the process's stdio into `topic` until EOF, then persists
    /// the terminal transition, closes the topic, and releases the slot.
    /// Runs to completion even if the caller that started the task has
    /// long since moved on.
    async fn finish_task(self: Arc<Self>, task_id: TaskId, slot_id: SlotId, workspace_id: WorkspaceId, task_ctx: Context, topic: Arc<Topic>) {
        let (stdout, stderr) = self.pool.with_process(slot_id, |p| p.take_stdio()).await.unwrap_or_default();
        ctlplane_stream::parser::pump(topic, stdout, stderr).await;

        let inspection = self.pool.inspect(slot_id).await;
        let cancelled = task_ctx.is_cancelled();
        let now = self.clock.epoch_ms();

        let result = RetryPolicy::retry_forever()
            .run(|| async {
                self.storage
                    .run_in_tx(|repos| async move {
                        let task = if cancelled {
                            repos.tasks().cancel(&Context::background(), task_id, now).await?
                        } else {
                            match inspection.as_ref().map(|i| i.state) {
                                Some(ProcessState::Exited(0)) => repos.tasks().complete(&Context::background(), task_id, 0, now).await?,
                                Some(ProcessState::Exited(code)) => {
                                    repos.tasks().fail(&Context::background(), task_id, FailureReason::NonZeroExit, Some(code), now).await?
                                }
                                _ => repos.tasks().fail(&Context::background(), task_id, FailureReason::ProcessCrashed, None, now).await?,
                            }
                        };
                        repos.sessions().record_command(&Context::background(), task.session_id, now).await?;
                        repos.workspaces().decrement_active_tasks(&Context::background(), workspace_id, now).await?;
                        Ok(task)
                    })
                    .await
            })
            .await;

        match result {
            Ok(task) => {
                let reason = task.failure.as_ref().map(failure_text);
                self.hub.close_topic(task_id, terminal_status_for(task.status), task.exit_code, reason);
            }
            Err(err) => {
                tracing::error!(%task_id, error = %err, "failed to finalize task after retries");
                self.hub.close_topic(task_id, TerminalStatus::Failed, None, Some(err.message));
            }
        }

        self.pool.release(slot_id);
        self.running.lock().remove(&task_id);
    }

    /// Cancels a running task's supervisor slot attach, which triggers the
    /// grace-kill sequence; `finish_task` observes the exit and persists
    /// `cancelled`.
    pub async fn cancel_task(&self, ctx: &Context, task_id: TaskId) -> CoreResult<()> {
        let task = self.storage.repos().tasks().get_by_id(ctx, task_id).await?;
        if task.status.is_terminal() {
            return Err(CoreError::conflict(format!("task {task_id} is already {}", task.status)));
        }
        let task_ctx = self
            .running
            .lock()
            .get(&task_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("no running slot bound to task {task_id}")))?;
        task_ctx.cancel();
        Ok(())
    }

    pub fn subscribe_task(&self, task_id: TaskId, since_seq: Option<u64>) -> CoreResult<Subscriber> {
        self.hub.subscribe(task_id, since_seq)
    }

    /// Background loop mirroring the supervisor pool's own health monitor:
    /// any session `active` with no activity for `inactivity_timeout` goes
    /// `idle`. Runs until `ctx` is cancelled.
    pub async fn run_idle_sweeper(self: Arc<Self>, ctx: Context) {
        let token = ctx.token();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.idle_sweep_interval) => {}
            }
            self.sweep_idle_sessions().await;
        }
    }

    async fn sweep_idle_sessions(&self) {
        let now = self.clock.epoch_ms();
        let cutoff = now.saturating_sub(self.config.inactivity_timeout.as_millis() as u64);
        let mut paging = Paging::first_page();
        loop {
            let sessions = match self.storage.repos().sessions().list(&Context::background(), paging).await {
                Ok(sessions) => sessions,
                Err(err) => {
                    tracing::warn!(error = %err, "idle sweep: failed to list sessions");
                    return;
                }
            };
            if sessions.is_empty() {
                return;
            }
            for session in &sessions {
                if session.status == ctlplane_core::SessionStatus::Active && session.last_active_ms <= cutoff {
                    if let Err(err) = self.storage.repos().sessions().go_idle(&Context::background(), session.id, now).await {
                        tracing::warn!(session_id = %session.id, error = %err, "idle sweep: go_idle failed");
                    }
                }
            }
            if sessions.len() < paging.limit as usize {
                return;
            }
            paging = Paging::new(paging.offset + paging.limit, paging.limit);
        }
    }
}

fn parse_slot_id(raw: &str) -> Option<SlotId> {
    raw.parse::<u64>().ok().map(SlotId)
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
