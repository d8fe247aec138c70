// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MVCC key-value driver backed by `surrealkv`. Every entity is serialized
//! as JSON under a composite key `"{kind}\0{id}"`; range scans over a
//! kind's prefix stand in for secondary indexes since the bucket has no
//! query planner. Every write goes through one `surrealkv` transaction, so
//! `get`-then-`set` sequences (version checks, uniqueness checks) are
//! atomic within a single repo call.

use crate::paging::Paging;
use crate::repo::{
    Patch, ProjectFields, ProjectRepo, RepoBundle, SessionFields, SessionRepo, TaskFields, TaskRepo,
    Tx, WorkspaceFields, WorkspaceRepo,
};
use async_trait::async_trait;
use ctlplane_core::{
    Context, CoreError, CoreResult, ErrorKind, OwnerId, Project, ProjectId, Session, SessionId,
    Task, TaskId, Workspace, WorkspaceId,
};
use std::path::Path;
use surrealkv::{Mode, Options, Store};

const WORKSPACES: &str = "workspaces";
const PROJECTS: &str = "projects";
const SESSIONS: &str = "sessions";
const TASKS: &str = "tasks";

fn composite_key(kind: &str, id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(kind.len() + 1 + id.len());
    buf.extend_from_slice(kind.as_bytes());
    buf.push(0);
    buf.extend_from_slice(id.as_bytes());
    buf
}

fn range_start(kind: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(kind.len() + 1);
    buf.extend_from_slice(kind.as_bytes());
    buf.push(0);
    buf
}

fn range_end(kind: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(kind.len() + 1);
    buf.extend_from_slice(kind.as_bytes());
    buf.push(1);
    buf
}

fn translate(e: surrealkv::Error) -> CoreError {
    CoreError::new(ErrorKind::ConnectionFailed, e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CoreError::internal(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::internal(e.to_string()))
}

/// Scan every value under `kind`'s prefix, deserializing each. Used in lieu
/// of a real secondary index; fine at this scale, revisit if `list`-family
/// calls start showing up in the slow-query monitor.
fn scan_kind<T: serde::de::DeserializeOwned>(tree: &Store, kind: &str) -> CoreResult<Vec<T>> {
    let mut tx = tree.begin_with_mode(Mode::ReadOnly).map_err(translate)?;
    let start = range_start(kind);
    let end = range_end(kind);
    let rows = tx.scan(start.as_slice()..end.as_slice(), None).map_err(translate)?;
    rows.into_iter().map(|(_, value, _)| decode(&value)).collect()
}

fn paginate<T>(items: Vec<T>, paging: Paging) -> Vec<T> {
    items.into_iter().skip(paging.offset as usize).take(paging.limit as usize).collect()
}

#[derive(Clone)]
pub struct KvEngine {
    tree: std::sync::Arc<Store>,
}

impl KvEngine {
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let opts = Options { dir: path.as_ref().to_path_buf(), ..Options::new() };
        let tree = Store::new(opts).map_err(translate)?;
        Ok(Self { tree: std::sync::Arc::new(tree) })
    }

    async fn get_workspace_raw(&self, id: &WorkspaceId) -> CoreResult<Option<Workspace>> {
        let mut tx = self.tree.begin_with_mode(Mode::ReadOnly).map_err(translate)?;
        match tx.get(&composite_key(WORKSPACES, id.as_str())).map_err(translate)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Run an FSM transition against the stored session and persist it.
    /// Shared by every `SessionRepo` transition method; not part of the
    /// trait itself since a generic closure argument isn't object-safe.
    async fn apply_session<F>(&self, id: SessionId, f: F) -> CoreResult<Session>
    where
        F: FnOnce(&mut Session) -> Result<(), ctlplane_core::SessionIllegalTransition>,
    {
        let mut current = SessionRepo::get_by_id(self, &Context::background(), id.clone()).await?;
        f(&mut current).map_err(|e| CoreError::conflict(e.to_string()))?;
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(SESSIONS, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(current)
    }

    /// Mirror of `apply_session` for tasks.
    async fn apply_task<F>(&self, id: TaskId, f: F) -> CoreResult<Task>
    where
        F: FnOnce(&mut Task) -> Result<(), ctlplane_core::TaskIllegalTransition>,
    {
        let mut current = TaskRepo::get_by_id(self, &Context::background(), id.clone()).await?;
        f(&mut current).map_err(|e| CoreError::conflict(e.to_string()))?;
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(TASKS, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(current)
    }
}

#[async_trait]
impl WorkspaceRepo for KvEngine {
    async fn create(&self, _ctx: &Context, workspace: Workspace) -> CoreResult<Workspace> {
        let existing: Vec<Workspace> = scan_kind(&self.tree, WORKSPACES)?;
        if existing.iter().any(|w| w.owner_id == workspace.owner_id && w.name == workspace.name && !w.is_deleted()) {
            return Err(CoreError::new(ErrorKind::AlreadyExists, "workspace name already in use for this owner"));
        }
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(WORKSPACES, workspace.id.as_str()), &encode(&workspace)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(workspace)
    }

    async fn get_by_id(&self, _ctx: &Context, id: WorkspaceId) -> CoreResult<Workspace> {
        self.get_workspace_raw(&id)
            .await?
            .filter(|w| !w.is_deleted())
            .ok_or_else(|| CoreError::not_found(format!("workspace {id}")))
    }

    async fn get_by_owner(&self, _ctx: &Context, owner_id: OwnerId, paging: Paging) -> CoreResult<Vec<Workspace>> {
        let mut all: Vec<Workspace> = scan_kind(&self.tree, WORKSPACES)?;
        all.retain(|w| w.owner_id == owner_id && !w.is_deleted());
        all.sort_by_key(|w| w.created_at_ms);
        Ok(paginate(all, paging))
    }

    async fn update(&self, _ctx: &Context, id: WorkspaceId, patch: Patch<WorkspaceFields>) -> CoreResult<Workspace> {
        let mut current = self.get_workspace_raw(&id).await?.ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
        if current.version != patch.expected_version {
            return Err(CoreError::version_mismatch(patch.expected_version, current.version));
        }
        if let Some(name) = patch.fields.name {
            let existing: Vec<Workspace> = scan_kind(&self.tree, WORKSPACES)?;
            if existing.iter().any(|w| w.id != id && w.owner_id == current.owner_id && w.name == name && !w.is_deleted()) {
                return Err(CoreError::new(ErrorKind::AlreadyExists, "workspace name already in use for this owner"));
            }
            current.name = name;
        }
        if let Some(status) = patch.fields.status {
            current.status = status;
        }
        current.version += 1;
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(WORKSPACES, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(current)
    }

    async fn delete(&self, _ctx: &Context, id: WorkspaceId) -> CoreResult<()> {
        let mut current = self.get_workspace_raw(&id).await?.ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
        if !current.can_delete() {
            return Err(CoreError::conflict("workspace has active tasks"));
        }
        current.deleted_at_ms = Some(current.updated_at_ms);
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(WORKSPACES, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(())
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Workspace>> {
        let mut all: Vec<Workspace> = scan_kind(&self.tree, WORKSPACES)?;
        all.retain(|w| !w.is_deleted());
        all.sort_by_key(|w| w.created_at_ms);
        Ok(paginate(all, paging))
    }

    async fn exists_by_owner_and_name(&self, _ctx: &Context, owner_id: OwnerId, name: &str) -> CoreResult<bool> {
        let all: Vec<Workspace> = scan_kind(&self.tree, WORKSPACES)?;
        Ok(all.iter().any(|w| w.owner_id == owner_id && w.name == name && !w.is_deleted()))
    }

    async fn increment_active_tasks(&self, _ctx: &Context, id: WorkspaceId, now_ms: u64) -> CoreResult<Workspace> {
        let mut current = self.get_workspace_raw(&id).await?.ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
        current.increment_active_tasks(now_ms);
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(WORKSPACES, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(current)
    }

    async fn decrement_active_tasks(&self, _ctx: &Context, id: WorkspaceId, now_ms: u64) -> CoreResult<Workspace> {
        let mut current = self.get_workspace_raw(&id).await?.ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
        current.decrement_active_tasks(now_ms);
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(WORKSPACES, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(current)
    }
}

#[async_trait]
impl ProjectRepo for KvEngine {
    async fn create(&self, _ctx: &Context, project: Project) -> CoreResult<Project> {
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(PROJECTS, project.id.as_str()), &encode(&project)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(project)
    }

    async fn get_by_id(&self, _ctx: &Context, id: ProjectId) -> CoreResult<Project> {
        let mut tx = self.tree.begin_with_mode(Mode::ReadOnly).map_err(translate)?;
        let bytes = tx.get(&composite_key(PROJECTS, id.as_str())).map_err(translate)?;
        let project: Project = decode(&bytes.ok_or_else(|| CoreError::not_found(format!("project {id}")))?)?;
        if project.is_deleted() {
            return Err(CoreError::not_found(format!("project {id}")));
        }
        Ok(project)
    }

    async fn get_by_workspace(&self, _ctx: &Context, workspace_id: WorkspaceId, paging: Paging) -> CoreResult<Vec<Project>> {
        let mut all: Vec<Project> = scan_kind(&self.tree, PROJECTS)?;
        all.retain(|p| p.workspace_id == workspace_id && !p.is_deleted());
        all.sort_by_key(|p| p.created_at_ms);
        Ok(paginate(all, paging))
    }

    async fn update(&self, _ctx: &Context, id: ProjectId, patch: Patch<ProjectFields>) -> CoreResult<Project> {
        let mut current = ProjectRepo::get_by_id(self, &Context::background(), id.clone()).await?;
        if current.version != patch.expected_version {
            return Err(CoreError::version_mismatch(patch.expected_version, current.version));
        }
        if let Some(name) = patch.fields.name {
            current.name = name;
        }
        if let Some(language) = patch.fields.language {
            current.language = language;
        }
        if let Some(git_remote) = patch.fields.git_remote {
            current.git_remote = git_remote;
        }
        if let Some(config) = patch.fields.config {
            current.config = config;
        }
        current.version += 1;
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(PROJECTS, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(current)
    }

    async fn delete(&self, _ctx: &Context, id: ProjectId) -> CoreResult<()> {
        let mut current = ProjectRepo::get_by_id(self, &Context::background(), id.clone()).await?;
        if !current.can_delete() {
            return Err(CoreError::conflict("project has live sessions"));
        }
        current.deleted_at_ms = Some(current.updated_at_ms);
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(PROJECTS, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(())
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Project>> {
        let mut all: Vec<Project> = scan_kind(&self.tree, PROJECTS)?;
        all.retain(|p| !p.is_deleted());
        all.sort_by_key(|p| p.created_at_ms);
        Ok(paginate(all, paging))
    }

    async fn register_session(&self, _ctx: &Context, id: ProjectId, now_ms: u64) -> CoreResult<Project> {
        let mut current = ProjectRepo::get_by_id(self, &Context::background(), id.clone()).await?;
        current.register_session(now_ms);
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(PROJECTS, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(current)
    }

    async fn release_session(&self, _ctx: &Context, id: ProjectId, now_ms: u64) -> CoreResult<Project> {
        let mut current = ProjectRepo::get_by_id(self, &Context::background(), id.clone()).await?;
        current.release_session(now_ms);
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(PROJECTS, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(current)
    }
}

#[async_trait]
impl SessionRepo for KvEngine {
    async fn create(&self, _ctx: &Context, session: Session) -> CoreResult<Session> {
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(SESSIONS, session.id.as_str()), &encode(&session)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(session)
    }

    async fn get_by_id(&self, _ctx: &Context, id: SessionId) -> CoreResult<Session> {
        let mut tx = self.tree.begin_with_mode(Mode::ReadOnly).map_err(translate)?;
        let bytes = tx.get(&composite_key(SESSIONS, id.as_str())).map_err(translate)?;
        decode(&bytes.ok_or_else(|| CoreError::not_found(format!("session {id}")))?)
    }

    async fn get_by_project(&self, _ctx: &Context, project_id: ProjectId, paging: Paging) -> CoreResult<Vec<Session>> {
        let mut all: Vec<Session> = scan_kind(&self.tree, SESSIONS)?;
        all.retain(|s| s.project_id == project_id);
        all.sort_by_key(|s| std::cmp::Reverse(s.last_active_ms));
        Ok(paginate(all, paging))
    }

    async fn get_by_process_id(&self, _ctx: &Context, process_id: &str) -> CoreResult<Session> {
        let all: Vec<Session> = scan_kind(&self.tree, SESSIONS)?;
        all.into_iter()
            .find(|s| s.process_id.as_deref() == Some(process_id))
            .ok_or_else(|| CoreError::not_found(format!("session bound to process {process_id}")))
    }

    async fn update(&self, _ctx: &Context, id: SessionId, patch: Patch<SessionFields>) -> CoreResult<Session> {
        let mut current = SessionRepo::get_by_id(self, &Context::background(), id.clone()).await?;
        if current.version != patch.expected_version {
            return Err(CoreError::version_mismatch(patch.expected_version, current.version));
        }
        if let Some(status) = patch.fields.status {
            current.status = status;
        }
        if let Some(metadata) = patch.fields.metadata {
            current.metadata = metadata;
        }
        current.version += 1;
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(SESSIONS, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(current)
    }

    async fn delete(&self, _ctx: &Context, id: SessionId) -> CoreResult<()> {
        let mut tx = self.tree.begin().map_err(translate)?;
        let key = composite_key(SESSIONS, id.as_str());
        if tx.get(&key).map_err(translate)?.is_none() {
            return Err(CoreError::not_found(format!("session {id}")));
        }
        tx.delete(&key).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(())
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Session>> {
        let mut all: Vec<Session> = scan_kind(&self.tree, SESSIONS)?;
        all.sort_by_key(|s| std::cmp::Reverse(s.last_active_ms));
        Ok(paginate(all, paging))
    }

    async fn activate(&self, _ctx: &Context, id: SessionId, process_id: String, now_ms: u64) -> CoreResult<Session> {
        self.apply_session(id, |s| s.activate(process_id, now_ms)).await
    }

    async fn go_idle(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        self.apply_session(id, |s| s.go_idle(now_ms)).await
    }

    async fn record_command(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        self.apply_session(id, |s| {
            s.record_command(now_ms);
            Ok(())
        })
        .await
    }

    async fn record_activity(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        self.apply_session(id, |s| {
            s.record_activity(now_ms);
            Ok(())
        })
        .await
    }

    async fn begin_end(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        self.apply_session(id, |s| s.begin_end(now_ms)).await
    }

    async fn finish_end(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        self.apply_session(id, |s| s.finish_end(now_ms)).await
    }
}

#[async_trait]
impl TaskRepo for KvEngine {
    async fn create(&self, _ctx: &Context, task: Task) -> CoreResult<Task> {
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(TASKS, task.id.as_str()), &encode(&task)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(task)
    }

    async fn get_by_id(&self, _ctx: &Context, id: TaskId) -> CoreResult<Task> {
        let mut tx = self.tree.begin_with_mode(Mode::ReadOnly).map_err(translate)?;
        let bytes = tx.get(&composite_key(TASKS, id.as_str())).map_err(translate)?;
        decode(&bytes.ok_or_else(|| CoreError::not_found(format!("task {id}")))?)
    }

    async fn get_by_session(&self, _ctx: &Context, session_id: SessionId, paging: Paging) -> CoreResult<Vec<Task>> {
        let mut all: Vec<Task> = scan_kind(&self.tree, TASKS)?;
        all.retain(|t| t.session_id == session_id);
        Ok(paginate(all, paging))
    }

    async fn update(&self, _ctx: &Context, id: TaskId, patch: Patch<TaskFields>) -> CoreResult<Task> {
        let mut current = TaskRepo::get_by_id(self, &Context::background(), id.clone()).await?;
        if current.version != patch.expected_version {
            return Err(CoreError::version_mismatch(patch.expected_version, current.version));
        }
        if let Some(status) = patch.fields.status {
            current.status = status;
        }
        if let Some(exit_code) = patch.fields.exit_code {
            current.exit_code = exit_code;
        }
        current.version += 1;
        let mut tx = self.tree.begin().map_err(translate)?;
        tx.set(&composite_key(TASKS, id.as_str()), &encode(&current)?).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(current)
    }

    async fn delete(&self, _ctx: &Context, id: TaskId) -> CoreResult<()> {
        let mut tx = self.tree.begin().map_err(translate)?;
        let key = composite_key(TASKS, id.as_str());
        if tx.get(&key).map_err(translate)?.is_none() {
            return Err(CoreError::not_found(format!("task {id}")));
        }
        tx.delete(&key).map_err(translate)?;
        tx.commit().await.map_err(translate)?;
        Ok(())
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Task>> {
        let all: Vec<Task> = scan_kind(&self.tree, TASKS)?;
        Ok(paginate(all, paging))
    }

    async fn search_by_command_prefix(&self, _ctx: &Context, prefix: &str, paging: Paging) -> CoreResult<Vec<Task>> {
        let prefix_lower = prefix.to_lowercase();
        let mut all: Vec<Task> = scan_kind(&self.tree, TASKS)?;
        all.retain(|t| t.command.to_lowercase().starts_with(&prefix_lower));
        Ok(paginate(all, paging))
    }

    async fn get_running_count(&self, _ctx: &Context, workspace_id: WorkspaceId) -> CoreResult<u64> {
        let sessions: Vec<Session> = scan_kind(&self.tree, SESSIONS)?;
        let projects: Vec<Project> = scan_kind(&self.tree, PROJECTS)?;
        let project_ids: std::collections::HashSet<ProjectId> =
            projects.iter().filter(|p| p.workspace_id == workspace_id).map(|p| p.id.clone()).collect();
        let session_ids: std::collections::HashSet<SessionId> =
            sessions.iter().filter(|s| project_ids.contains(&s.project_id)).map(|s| s.id.clone()).collect();
        let tasks: Vec<Task> = scan_kind(&self.tree, TASKS)?;
        let count = tasks
            .iter()
            .filter(|t| session_ids.contains(&t.session_id) && t.status == ctlplane_core::TaskStatus::Running)
            .count();
        Ok(count as u64)
    }

    async fn start(&self, _ctx: &Context, id: TaskId, now_ms: u64) -> CoreResult<Task> {
        self.apply_task(id, |t| t.start(now_ms)).await
    }

    async fn record_output(&self, _ctx: &Context, id: TaskId, bytes: u64) -> CoreResult<Task> {
        self.apply_task(id, |t| {
            t.record_output(bytes);
            Ok(())
        })
        .await
    }

    async fn record_error(&self, _ctx: &Context, id: TaskId, bytes: u64) -> CoreResult<Task> {
        self.apply_task(id, |t| {
            t.record_error(bytes);
            Ok(())
        })
        .await
    }

    async fn complete(&self, _ctx: &Context, id: TaskId, exit_code: i32, now_ms: u64) -> CoreResult<Task> {
        self.apply_task(id, |t| t.complete(exit_code, now_ms)).await
    }

    async fn fail(&self, _ctx: &Context, id: TaskId, reason: ctlplane_core::FailureReason, exit_code: Option<i32>, now_ms: u64) -> CoreResult<Task> {
        self.apply_task(id, |t| t.fail(reason, exit_code, now_ms)).await
    }

    async fn cancel(&self, _ctx: &Context, id: TaskId, now_ms: u64) -> CoreResult<Task> {
        self.apply_task(id, |t| t.cancel(now_ms)).await
    }
}

impl RepoBundle for KvEngine {
    fn workspaces(&self) -> &dyn WorkspaceRepo {
        self
    }
    fn projects(&self) -> &dyn ProjectRepo {
        self
    }
    fn sessions(&self) -> &dyn SessionRepo {
        self
    }
    fn tasks(&self) -> &dyn TaskRepo {
        self
    }
}

pub struct KvTx {
    engine: KvEngine,
}

impl KvTx {
    pub fn new(engine: KvEngine) -> Self {
        Self { engine }
    }
}

impl RepoBundle for KvTx {
    fn workspaces(&self) -> &dyn WorkspaceRepo {
        &self.engine
    }
    fn projects(&self) -> &dyn ProjectRepo {
        &self.engine
    }
    fn sessions(&self) -> &dyn SessionRepo {
        &self.engine
    }
    fn tasks(&self) -> &dyn TaskRepo {
        &self.engine
    }
}

#[async_trait]
impl Tx for KvTx {
    async fn commit(self: Box<Self>) -> CoreResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
