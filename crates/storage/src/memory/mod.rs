// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory driver: one `RwLock` over per-entity `HashMap`s, matching the
//! single-mutex concurrency policy the other drivers use. Used for unit
//! tests and as the default when no backend is configured.

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
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Store {
    workspaces: HashMap<WorkspaceId, Workspace>,
    projects: HashMap<ProjectId, Project>,
    sessions: HashMap<SessionId, Session>,
    tasks: HashMap<TaskId, Task>,
}

/// The memory-backed capability bundle. Cloning shares the underlying store.
#[derive(Clone, Default)]
pub struct MemoryEngine {
    store: Arc<RwLock<Store>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_version(expected: u64, actual: u64) -> CoreResult<()> {
    if expected != actual {
        return Err(CoreError::version_mismatch(expected, actual));
    }
    Ok(())
}

#[async_trait]
impl WorkspaceRepo for MemoryEngine {
    async fn create(&self, _ctx: &Context, workspace: Workspace) -> CoreResult<Workspace> {
        let mut store = self.store.write();
        if store.workspaces.values().any(|w| {
            !w.is_deleted() && w.owner_id == workspace.owner_id && w.name == workspace.name
        }) {
            return Err(CoreError::new(ErrorKind::AlreadyExists, format!("workspace {} exists", workspace.name)));
        }
        store.workspaces.insert(workspace.id, workspace.clone());
        Ok(workspace)
    }

    async fn get_by_id(&self, _ctx: &Context, id: WorkspaceId) -> CoreResult<Workspace> {
        let store = self.store.read();
        store
            .workspaces
            .get(&id)
            .filter(|w| !w.is_deleted())
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("workspace {id}")))
    }

    async fn get_by_owner(&self, _ctx: &Context, owner_id: OwnerId, paging: Paging) -> CoreResult<Vec<Workspace>> {
        let store = self.store.read();
        Ok(paginate(
            store.workspaces.values().filter(|w| !w.is_deleted() && w.owner_id == owner_id),
            paging,
        ))
    }

    async fn update(&self, _ctx: &Context, id: WorkspaceId, patch: Patch<WorkspaceFields>) -> CoreResult<Workspace> {
        let mut store = self.store.write();
        let owner_id = {
            let ws = store.workspaces.get(&id).filter(|w| !w.is_deleted()).ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
            check_version(patch.expected_version, ws.version)?;
            ws.owner_id
        };
        if let Some(name) = &patch.fields.name {
            if store.workspaces.values().any(|w| w.id != id && !w.is_deleted() && w.owner_id == owner_id && &w.name == name) {
                return Err(CoreError::new(ErrorKind::AlreadyExists, format!("workspace {name} exists")));
            }
        }
        let ws = store.workspaces.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
        if let Some(name) = patch.fields.name {
            ws.name = name;
        }
        if let Some(status) = patch.fields.status {
            ws.status = status;
        }
        ws.version += 1;
        Ok(ws.clone())
    }

    async fn delete(&self, _ctx: &Context, id: WorkspaceId) -> CoreResult<()> {
        let mut store = self.store.write();
        let ws = store.workspaces.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
        if !ws.can_delete() {
            return Err(CoreError::conflict("workspace has active tasks"));
        }
        ws.deleted_at_ms = Some(ws.updated_at_ms);
        Ok(())
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Workspace>> {
        let store = self.store.read();
        Ok(paginate(store.workspaces.values().filter(|w| !w.is_deleted()), paging))
    }

    async fn exists_by_owner_and_name(&self, _ctx: &Context, owner_id: OwnerId, name: &str) -> CoreResult<bool> {
        let store = self.store.read();
        Ok(store.workspaces.values().any(|w| !w.is_deleted() && w.owner_id == owner_id && w.name == name))
    }

    async fn increment_active_tasks(&self, _ctx: &Context, id: WorkspaceId, now_ms: u64) -> CoreResult<Workspace> {
        let mut store = self.store.write();
        let ws = store.workspaces.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
        ws.increment_active_tasks(now_ms);
        Ok(ws.clone())
    }

    async fn decrement_active_tasks(&self, _ctx: &Context, id: WorkspaceId, now_ms: u64) -> CoreResult<Workspace> {
        let mut store = self.store.write();
        let ws = store.workspaces.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
        ws.decrement_active_tasks(now_ms);
        Ok(ws.clone())
    }
}

#[async_trait]
impl ProjectRepo for MemoryEngine {
    async fn create(&self, _ctx: &Context, project: Project) -> CoreResult<Project> {
        let mut store = self.store.write();
        store.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn get_by_id(&self, _ctx: &Context, id: ProjectId) -> CoreResult<Project> {
        let store = self.store.read();
        store.projects.get(&id).filter(|p| !p.is_deleted()).cloned().ok_or_else(|| CoreError::not_found(format!("project {id}")))
    }

    async fn get_by_workspace(&self, _ctx: &Context, workspace_id: WorkspaceId, paging: Paging) -> CoreResult<Vec<Project>> {
        let store = self.store.read();
        Ok(paginate(store.projects.values().filter(|p| !p.is_deleted() && p.workspace_id == workspace_id), paging))
    }

    async fn update(&self, _ctx: &Context, id: ProjectId, patch: Patch<ProjectFields>) -> CoreResult<Project> {
        let mut store = self.store.write();
        let p = store.projects.get_mut(&id).filter(|p| !p.is_deleted()).ok_or_else(|| CoreError::not_found(format!("project {id}")))?;
        check_version(patch.expected_version, p.version)?;
        if let Some(name) = patch.fields.name {
            p.name = name;
        }
        if let Some(language) = patch.fields.language {
            p.language = language;
        }
        if let Some(git_remote) = patch.fields.git_remote {
            p.git_remote = git_remote;
        }
        if let Some(config) = patch.fields.config {
            p.config = config;
        }
        p.version += 1;
        Ok(p.clone())
    }

    async fn delete(&self, _ctx: &Context, id: ProjectId) -> CoreResult<()> {
        let mut store = self.store.write();
        let p = store.projects.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("project {id}")))?;
        if !p.can_delete() {
            return Err(CoreError::conflict("project has live sessions"));
        }
        p.deleted_at_ms = Some(p.updated_at_ms);
        Ok(())
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Project>> {
        let store = self.store.read();
        Ok(paginate(store.projects.values().filter(|p| !p.is_deleted()), paging))
    }

    async fn register_session(&self, _ctx: &Context, id: ProjectId, now_ms: u64) -> CoreResult<Project> {
        let mut store = self.store.write();
        let p = store.projects.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("project {id}")))?;
        p.register_session(now_ms);
        Ok(p.clone())
    }

    async fn release_session(&self, _ctx: &Context, id: ProjectId, now_ms: u64) -> CoreResult<Project> {
        let mut store = self.store.write();
        let p = store.projects.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("project {id}")))?;
        p.release_session(now_ms);
        Ok(p.clone())
    }
}

#[async_trait]
impl SessionRepo for MemoryEngine {
    async fn create(&self, _ctx: &Context, session: Session) -> CoreResult<Session> {
        let mut store = self.store.write();
        store.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_by_id(&self, _ctx: &Context, id: SessionId) -> CoreResult<Session> {
        let store = self.store.read();
        store.sessions.get(&id).cloned().ok_or_else(|| CoreError::not_found(format!("session {id}")))
    }

    async fn get_by_project(&self, _ctx: &Context, project_id: ProjectId, paging: Paging) -> CoreResult<Vec<Session>> {
        let store = self.store.read();
        Ok(paginate(store.sessions.values().filter(|s| s.project_id == project_id), paging))
    }

    async fn get_by_process_id(&self, _ctx: &Context, process_id: &str) -> CoreResult<Session> {
        let store = self.store.read();
        store
            .sessions
            .values()
            .find(|s| s.process_id.as_deref() == Some(process_id))
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("session bound to process {process_id}")))
    }

    async fn update(&self, _ctx: &Context, id: SessionId, patch: Patch<SessionFields>) -> CoreResult<Session> {
        let mut store = self.store.write();
        let s = store.sessions.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("session {id}")))?;
        check_version(patch.expected_version, s.version)?;
        if let Some(status) = patch.fields.status {
            s.status = status;
        }
        if let Some(metadata) = patch.fields.metadata {
            s.metadata = metadata;
        }
        s.version += 1;
        Ok(s.clone())
    }

    async fn delete(&self, _ctx: &Context, id: SessionId) -> CoreResult<()> {
        let mut store = self.store.write();
        store.sessions.remove(&id).ok_or_else(|| CoreError::not_found(format!("session {id}")))?;
        Ok(())
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Session>> {
        let store = self.store.read();
        Ok(paginate(store.sessions.values(), paging))
    }

    async fn activate(&self, _ctx: &Context, id: SessionId, process_id: String, now_ms: u64) -> CoreResult<Session> {
        let mut store = self.store.write();
        let s = store.sessions.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("session {id}")))?;
        s.activate(process_id, now_ms).map_err(|e| CoreError::conflict(e.to_string()))?;
        Ok(s.clone())
    }

    async fn go_idle(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        let mut store = self.store.write();
        let s = store.sessions.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("session {id}")))?;
        s.go_idle(now_ms).map_err(|e| CoreError::conflict(e.to_string()))?;
        Ok(s.clone())
    }

    async fn record_command(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        let mut store = self.store.write();
        let s = store.sessions.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("session {id}")))?;
        s.record_command(now_ms);
        Ok(s.clone())
    }

    async fn record_activity(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        let mut store = self.store.write();
        let s = store.sessions.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("session {id}")))?;
        s.record_activity(now_ms);
        Ok(s.clone())
    }

    async fn begin_end(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        let mut store = self.store.write();
        let s = store.sessions.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("session {id}")))?;
        s.begin_end(now_ms).map_err(|e| CoreError::conflict(e.to_string()))?;
        Ok(s.clone())
    }

    async fn finish_end(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        let mut store = self.store.write();
        let s = store.sessions.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("session {id}")))?;
        s.finish_end(now_ms).map_err(|e| CoreError::conflict(e.to_string()))?;
        Ok(s.clone())
    }
}

#[async_trait]
impl TaskRepo for MemoryEngine {
    async fn create(&self, _ctx: &Context, task: Task) -> CoreResult<Task> {
        let mut store = self.store.write();
        store.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_by_id(&self, _ctx: &Context, id: TaskId) -> CoreResult<Task> {
        let store = self.store.read();
        store.tasks.get(&id).cloned().ok_or_else(|| CoreError::not_found(format!("task {id}")))
    }

    async fn get_by_session(&self, _ctx: &Context, session_id: SessionId, paging: Paging) -> CoreResult<Vec<Task>> {
        let store = self.store.read();
        Ok(paginate(store.tasks.values().filter(|t| t.session_id == session_id), paging))
    }

    async fn update(&self, _ctx: &Context, id: TaskId, patch: Patch<TaskFields>) -> CoreResult<Task> {
        let mut store = self.store.write();
        let t = store.tasks.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("task {id}")))?;
        check_version(patch.expected_version, t.version)?;
        if let Some(status) = patch.fields.status {
            t.status = status;
        }
        if let Some(exit_code) = patch.fields.exit_code {
            t.exit_code = exit_code;
        }
        t.version += 1;
        Ok(t.clone())
    }

    async fn delete(&self, _ctx: &Context, id: TaskId) -> CoreResult<()> {
        let mut store = self.store.write();
        store.tasks.remove(&id).ok_or_else(|| CoreError::not_found(format!("task {id}")))?;
        Ok(())
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Task>> {
        let store = self.store.read();
        Ok(paginate(store.tasks.values(), paging))
    }

    async fn search_by_command_prefix(&self, _ctx: &Context, prefix: &str, paging: Paging) -> CoreResult<Vec<Task>> {
        let needle = prefix.to_lowercase();
        let store = self.store.read();
        Ok(paginate(store.tasks.values().filter(|t| t.command.to_lowercase().starts_with(&needle)), paging))
    }

    async fn get_running_count(&self, _ctx: &Context, workspace_id: WorkspaceId) -> CoreResult<u64> {
        let store = self.store.read();
        let count = store
            .tasks
            .values()
            .filter(|t| t.status == ctlplane_core::TaskStatus::Running)
            .filter(|t| {
                store
                    .sessions
                    .get(&t.session_id)
                    .and_then(|s| store.projects.get(&s.project_id))
                    .is_some_and(|p| p.workspace_id == workspace_id)
            })
            .count();
        Ok(count as u64)
    }

    async fn start(&self, _ctx: &Context, id: TaskId, now_ms: u64) -> CoreResult<Task> {
        let mut store = self.store.write();
        let t = store.tasks.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("task {id}")))?;
        t.start(now_ms).map_err(|e| CoreError::conflict(e.to_string()))?;
        Ok(t.clone())
    }

    async fn record_output(&self, _ctx: &Context, id: TaskId, bytes: u64) -> CoreResult<Task> {
        let mut store = self.store.write();
        let t = store.tasks.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("task {id}")))?;
        t.record_output(bytes);
        Ok(t.clone())
    }

    async fn record_error(&self, _ctx: &Context, id: TaskId, bytes: u64) -> CoreResult<Task> {
        let mut store = self.store.write();
        let t = store.tasks.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("task {id}")))?;
        t.record_error(bytes);
        Ok(t.clone())
    }

    async fn complete(&self, _ctx: &Context, id: TaskId, exit_code: i32, now_ms: u64) -> CoreResult<Task> {
        let mut store = self.store.write();
        let t = store.tasks.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("task {id}")))?;
        t.complete(exit_code, now_ms).map_err(|e| CoreError::conflict(e.to_string()))?;
        Ok(t.clone())
    }

    async fn fail(&self, _ctx: &Context, id: TaskId, reason: ctlplane_core::FailureReason, exit_code: Option<i32>, now_ms: u64) -> CoreResult<Task> {
        let mut store = self.store.write();
        let t = store.tasks.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("task {id}")))?;
        t.fail(reason, exit_code, now_ms).map_err(|e| CoreError::conflict(e.to_string()))?;
        Ok(t.clone())
    }

    async fn cancel(&self, _ctx: &Context, id: TaskId, now_ms: u64) -> CoreResult<Task> {
        let mut store = self.store.write();
        let t = store.tasks.get_mut(&id).ok_or_else(|| CoreError::not_found(format!("task {id}")))?;
        t.cancel(now_ms).map_err(|e| CoreError::conflict(e.to_string()))?;
        Ok(t.clone())
    }
}

fn paginate<'a, T: Clone + 'a>(iter: impl Iterator<Item = &'a T>, paging: Paging) -> Vec<T> {
    iter.skip(paging.offset as usize).take(paging.limit as usize).cloned().collect()
}

impl RepoBundle for MemoryEngine {
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

/// A "transaction" over the memory store. Since the store is already guarded
/// by a single `RwLock`, begin/commit/rollback are bookkeeping only; the
/// real atomicity comes from holding the write lock for the whole `run_in_tx`
/// closure (see `crate::engine`).
pub struct MemoryTx {
    engine: MemoryEngine,
}

impl MemoryTx {
    pub fn new(engine: MemoryEngine) -> Self {
        Self { engine }
    }
}

impl RepoBundle for MemoryTx {
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
impl Tx for MemoryTx {
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
