// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed repository contracts, one per entity, implemented identically by
//! every driver and by a `Tx`. Every method takes a [`Context`] so callers
//! can bound latency and cooperatively cancel.

use crate::paging::Paging;
use async_trait::async_trait;
use ctlplane_core::{
    Context, CoreResult, FailureReason, OwnerId, Project, ProjectId, Session, SessionId, Task,
    TaskId, Workspace, WorkspaceId,
};

/// A partial update. Absent fields are left untouched; `version` must match
/// the row's current version or the call fails with `VersionMismatch`.
#[derive(Debug, Clone, Default)]
pub struct Patch<F> {
    pub expected_version: u64,
    pub fields: F,
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceFields {
    pub name: Option<String>,
    pub status: Option<ctlplane_core::WorkspaceStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectFields {
    pub name: Option<String>,
    pub language: Option<Option<String>>,
    pub git_remote: Option<Option<String>>,
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFields {
    pub status: Option<ctlplane_core::SessionStatus>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFields {
    pub status: Option<ctlplane_core::TaskStatus>,
    pub exit_code: Option<Option<i32>>,
}

pub struct WorkspaceStats {
    pub total: u64,
    pub active: u64,
    pub running_tasks: u64,
}

#[async_trait]
pub trait WorkspaceRepo: Send + Sync {
    async fn create(&self, ctx: &Context, workspace: Workspace) -> CoreResult<Workspace>;
    async fn get_by_id(&self, ctx: &Context, id: WorkspaceId) -> CoreResult<Workspace>;
    async fn get_by_owner(&self, ctx: &Context, owner_id: OwnerId, paging: Paging) -> CoreResult<Vec<Workspace>>;
    async fn update(&self, ctx: &Context, id: WorkspaceId, patch: Patch<WorkspaceFields>) -> CoreResult<Workspace>;
    async fn delete(&self, ctx: &Context, id: WorkspaceId) -> CoreResult<()>;
    async fn list(&self, ctx: &Context, paging: Paging) -> CoreResult<Vec<Workspace>>;
    async fn exists_by_owner_and_name(&self, ctx: &Context, owner_id: OwnerId, name: &str) -> CoreResult<bool>;
    /// Bump the denormalized `active_tasks` counter on task start/terminal
    /// transition. Not exposed through `WorkspaceFields`/`update`: callers
    /// never set this counter directly, only task-transition bookkeeping
    /// moves it, in the same transaction as the task row write.
    async fn increment_active_tasks(&self, ctx: &Context, id: WorkspaceId, now_ms: u64) -> CoreResult<Workspace>;
    async fn decrement_active_tasks(&self, ctx: &Context, id: WorkspaceId, now_ms: u64) -> CoreResult<Workspace>;
}

#[async_trait]
pub trait ProjectRepo: Send + Sync {
    async fn create(&self, ctx: &Context, project: Project) -> CoreResult<Project>;
    async fn get_by_id(&self, ctx: &Context, id: ProjectId) -> CoreResult<Project>;
    async fn get_by_workspace(&self, ctx: &Context, workspace_id: WorkspaceId, paging: Paging) -> CoreResult<Vec<Project>>;
    async fn update(&self, ctx: &Context, id: ProjectId, patch: Patch<ProjectFields>) -> CoreResult<Project>;
    async fn delete(&self, ctx: &Context, id: ProjectId) -> CoreResult<()>;
    async fn list(&self, ctx: &Context, paging: Paging) -> CoreResult<Vec<Project>>;
    /// Bump the denormalized `live_sessions` counter on session create/end,
    /// in the same transaction as the session row write.
    async fn register_session(&self, ctx: &Context, id: ProjectId, now_ms: u64) -> CoreResult<Project>;
    async fn release_session(&self, ctx: &Context, id: ProjectId, now_ms: u64) -> CoreResult<Project>;
}

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn create(&self, ctx: &Context, session: Session) -> CoreResult<Session>;
    async fn get_by_id(&self, ctx: &Context, id: SessionId) -> CoreResult<Session>;
    async fn get_by_project(&self, ctx: &Context, project_id: ProjectId, paging: Paging) -> CoreResult<Vec<Session>>;
    async fn get_by_process_id(&self, ctx: &Context, process_id: &str) -> CoreResult<Session>;
    async fn update(&self, ctx: &Context, id: SessionId, patch: Patch<SessionFields>) -> CoreResult<Session>;
    async fn delete(&self, ctx: &Context, id: SessionId) -> CoreResult<()>;
    async fn list(&self, ctx: &Context, paging: Paging) -> CoreResult<Vec<Session>>;
    /// FSM transitions below run the entity's own state-machine method and
    /// persist the result, failing with `Conflict` on an illegal
    /// transition. `update`/`SessionFields` only ever touches `metadata`;
    /// everything status-bearing moves exclusively through these.
    async fn activate(&self, ctx: &Context, id: SessionId, process_id: String, now_ms: u64) -> CoreResult<Session>;
    async fn go_idle(&self, ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session>;
    async fn record_command(&self, ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session>;
    async fn record_activity(&self, ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session>;
    async fn begin_end(&self, ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session>;
    async fn finish_end(&self, ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session>;
}

#[async_trait]
pub trait TaskRepo: Send + Sync {
    async fn create(&self, ctx: &Context, task: Task) -> CoreResult<Task>;
    async fn get_by_id(&self, ctx: &Context, id: TaskId) -> CoreResult<Task>;
    async fn get_by_session(&self, ctx: &Context, session_id: SessionId, paging: Paging) -> CoreResult<Vec<Task>>;
    async fn update(&self, ctx: &Context, id: TaskId, patch: Patch<TaskFields>) -> CoreResult<Task>;
    async fn delete(&self, ctx: &Context, id: TaskId) -> CoreResult<()>;
    async fn list(&self, ctx: &Context, paging: Paging) -> CoreResult<Vec<Task>>;
    /// Token-prefix search over `command`, tokenized on whitespace/punctuation.
    async fn search_by_command_prefix(&self, ctx: &Context, prefix: &str, paging: Paging) -> CoreResult<Vec<Task>>;
    async fn get_running_count(&self, ctx: &Context, workspace_id: WorkspaceId) -> CoreResult<u64>;
    /// FSM transitions, see [`SessionRepo`]'s equivalent note.
    async fn start(&self, ctx: &Context, id: TaskId, now_ms: u64) -> CoreResult<Task>;
    async fn record_output(&self, ctx: &Context, id: TaskId, bytes: u64) -> CoreResult<Task>;
    async fn record_error(&self, ctx: &Context, id: TaskId, bytes: u64) -> CoreResult<Task>;
    async fn complete(&self, ctx: &Context, id: TaskId, exit_code: i32, now_ms: u64) -> CoreResult<Task>;
    async fn fail(&self, ctx: &Context, id: TaskId, reason: FailureReason, exit_code: Option<i32>, now_ms: u64) -> CoreResult<Task>;
    async fn cancel(&self, ctx: &Context, id: TaskId, now_ms: u64) -> CoreResult<Task>;
}

/// The capability bundle returned by a driver: one repo per entity. `Tx`
/// implements the same bundle so callers write identical code whether or
/// not they're inside a transaction.
pub trait RepoBundle: Send + Sync {
    fn workspaces(&self) -> &dyn WorkspaceRepo;
    fn projects(&self) -> &dyn ProjectRepo;
    fn sessions(&self) -> &dyn SessionRepo;
    fn tasks(&self) -> &dyn TaskRepo;
}

/// A grouped view over a `RepoBundle`. No driver backing this trait holds a
/// connection-level transaction across the calls made through it; each call
/// commits itself. `commit`/`rollback` are no-ops everywhere — see
/// `Engine::run_in_tx`.
#[async_trait]
pub trait Tx: RepoBundle {
    async fn commit(self: Box<Self>) -> CoreResult<()>;
    async fn rollback(self: Box<Self>) -> CoreResult<()>;
}
