// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relational driver backed by `rusqlite`. Single writer (`max_open_conns`
//! is effectively 1 — one connection behind a mutex), WAL journal mode,
//! serializable semantics. `rusqlite::Connection::prepare_cached` supplies
//! the process-scoped prepared-statement cache the storage contract calls
//! for.

mod schema;

use crate::paging::Paging;
use crate::repo::{
    Patch, ProjectFields, ProjectRepo, RepoBundle, SessionFields, SessionRepo, TaskFields, TaskRepo,
    Tx, WorkspaceFields, WorkspaceRepo,
};
use async_trait::async_trait;
use ctlplane_core::{
    Context, CoreError, CoreResult, ErrorKind, FailureReason, OwnerId, Project, ProjectId, Session,
    SessionId, SessionIllegalTransition, SessionStatus, Task, TaskId, TaskIllegalTransition,
    TaskStatus, Workspace, WorkspaceId, WorkspaceStatus,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;

fn translate(err: rusqlite::Error) -> CoreError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => CoreError::not_found("row not found"),
        rusqlite::Error::SqliteFailure(e, msg) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            CoreError::new(ErrorKind::AlreadyExists, msg.unwrap_or_else(|| "constraint violation".into()))
        }
        other => CoreError::new(ErrorKind::ConnectionFailed, other.to_string()),
    }
}

fn status_str(status: WorkspaceStatus) -> &'static str {
    match status {
        WorkspaceStatus::Active => "active",
        WorkspaceStatus::Inactive => "inactive",
        WorkspaceStatus::Archived => "archived",
    }
}

fn parse_workspace_status(s: &str) -> CoreResult<WorkspaceStatus> {
    match s {
        "active" => Ok(WorkspaceStatus::Active),
        "inactive" => Ok(WorkspaceStatus::Inactive),
        "archived" => Ok(WorkspaceStatus::Archived),
        other => Err(CoreError::internal(format!("unknown workspace status {other}"))),
    }
}

fn session_status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Pending => "pending",
        SessionStatus::Active => "active",
        SessionStatus::Idle => "idle",
        SessionStatus::Ending => "ending",
        SessionStatus::Ended => "ended",
    }
}

fn parse_session_status(s: &str) -> CoreResult<SessionStatus> {
    Ok(match s {
        "pending" => SessionStatus::Pending,
        "active" => SessionStatus::Active,
        "idle" => SessionStatus::Idle,
        "ending" => SessionStatus::Ending,
        "ended" => SessionStatus::Ended,
        other => return Err(CoreError::internal(format!("unknown session status {other}"))),
    })
}

fn task_status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Running => "running",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Cancelled => "cancelled",
    }
}

fn parse_task_status(s: &str) -> CoreResult<TaskStatus> {
    Ok(match s {
        "pending" => TaskStatus::Pending,
        "running" => TaskStatus::Running,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "cancelled" => TaskStatus::Cancelled,
        other => return Err(CoreError::internal(format!("unknown task status {other}"))),
    })
}

fn workspace_from_row(row: &Row<'_>) -> rusqlite::Result<CoreResult<Workspace>> {
    let status_raw: String = row.get("status")?;
    let status = match parse_workspace_status(&status_raw) {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };
    Ok(Ok(Workspace {
        id: WorkspaceId::from_string(row.get::<_, String>("id")?),
        owner_id: OwnerId::from_string(row.get::<_, String>("owner_id")?),
        name: row.get("name")?,
        project_path: row.get::<_, String>("project_path")?.into(),
        status,
        active_tasks: row.get::<_, i64>("active_tasks")? as u32,
        created_at_ms: row.get::<_, i64>("created_at_ms")? as u64,
        updated_at_ms: row.get::<_, i64>("updated_at_ms")? as u64,
        deleted_at_ms: row.get::<_, Option<i64>>("deleted_at_ms")?.map(|v| v as u64),
        version: row.get::<_, i64>("version")? as u64,
    }))
}

/// Shared connection handle, cloned cheaply across repo trait impls. Every
/// method hops onto `spawn_blocking` since `rusqlite` is a synchronous API.
#[derive(Clone)]
pub struct RelationalEngine {
    conn: Arc<Mutex<Connection>>,
}

impl RelationalEngine {
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let conn = Connection::open(path).map_err(translate)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(translate)?;
        conn.execute_batch(schema::CREATE_TABLES).map_err(translate)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(translate)?;
        conn.execute_batch(schema::CREATE_TABLES).map_err(translate)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn blocking<T, F>(&self, f: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> CoreResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| CoreError::internal(format!("blocking task panicked: {e}")))?
    }
}

#[async_trait]
impl WorkspaceRepo for RelationalEngine {
    async fn create(&self, _ctx: &Context, workspace: Workspace) -> CoreResult<Workspace> {
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO workspaces (id, owner_id, name, project_path, status, active_tasks, created_at_ms, updated_at_ms, deleted_at_ms, version) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                params![
                    workspace.id.as_str(),
                    workspace.owner_id.as_str(),
                    workspace.name,
                    workspace.project_path.to_string_lossy(),
                    status_str(workspace.status),
                    workspace.active_tasks,
                    workspace.created_at_ms as i64,
                    workspace.updated_at_ms as i64,
                    workspace.deleted_at_ms.map(|v| v as i64),
                    workspace.version as i64,
                ],
            )
            .map_err(translate)?;
            Ok(workspace)
        })
        .await
    }

    async fn get_by_id(&self, _ctx: &Context, id: WorkspaceId) -> CoreResult<Workspace> {
        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    "SELECT * FROM workspaces WHERE id = ?1 AND deleted_at_ms IS NULL",
                    params![id.as_str()],
                    |row| workspace_from_row(row),
                )
                .optional()
                .map_err(translate)?;
            row.transpose()?.ok_or_else(|| CoreError::not_found(format!("workspace {id}")))
        })
        .await
    }

    async fn get_by_owner(&self, _ctx: &Context, owner_id: OwnerId, paging: Paging) -> CoreResult<Vec<Workspace>> {
        self.blocking(move |conn| {
            let mut stmt = conn
                .prepare_cached("SELECT * FROM workspaces WHERE owner_id = ?1 AND deleted_at_ms IS NULL ORDER BY created_at_ms LIMIT ?2 OFFSET ?3")
                .map_err(translate)?;
            let rows = stmt
                .query_map(params![owner_id.as_str(), paging.limit, paging.offset], workspace_from_row)
                .map_err(translate)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(translate)?.into_iter().collect()
        })
        .await
    }

    async fn update(&self, _ctx: &Context, id: WorkspaceId, patch: Patch<WorkspaceFields>) -> CoreResult<Workspace> {
        self.blocking(move |conn| {
            let tx = conn.unchecked_transaction().map_err(translate)?;
            let current = tx
                .query_row("SELECT * FROM workspaces WHERE id = ?1 AND deleted_at_ms IS NULL", params![id.as_str()], workspace_from_row)
                .optional()
                .map_err(translate)?
                .transpose()?
                .ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
            if current.version != patch.expected_version {
                return Err(CoreError::version_mismatch(patch.expected_version, current.version));
            }
            let name = patch.fields.name.unwrap_or(current.name);
            let status = patch.fields.status.unwrap_or(current.status);
            let new_version = current.version + 1;
            tx.execute(
                "UPDATE workspaces SET name = ?1, status = ?2, version = ?3 WHERE id = ?4",
                params![name, status_str(status), new_version as i64, id.as_str()],
            )
            .map_err(translate)?;
            tx.commit().map_err(translate)?;
            Ok(Workspace { name, status, version: new_version, ..current })
        })
        .await
    }

    async fn delete(&self, _ctx: &Context, id: WorkspaceId) -> CoreResult<()> {
        self.blocking(move |conn| {
            let active_tasks: i64 = conn
                .query_row("SELECT active_tasks FROM workspaces WHERE id = ?1", params![id.as_str()], |r| r.get(0))
                .optional()
                .map_err(translate)?
                .ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
            if active_tasks != 0 {
                return Err(CoreError::conflict("workspace has active tasks"));
            }
            conn.execute(
                "UPDATE workspaces SET deleted_at_ms = updated_at_ms WHERE id = ?1",
                params![id.as_str()],
            )
            .map_err(translate)?;
            Ok(())
        })
        .await
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Workspace>> {
        self.blocking(move |conn| {
            let mut stmt = conn
                .prepare_cached("SELECT * FROM workspaces WHERE deleted_at_ms IS NULL ORDER BY created_at_ms LIMIT ?1 OFFSET ?2")
                .map_err(translate)?;
            let rows = stmt.query_map(params![paging.limit, paging.offset], workspace_from_row).map_err(translate)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(translate)?.into_iter().collect()
        })
        .await
    }

    async fn exists_by_owner_and_name(&self, _ctx: &Context, owner_id: OwnerId, name: &str) -> CoreResult<bool> {
        let name = name.to_string();
        self.blocking(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM workspaces WHERE owner_id = ?1 AND name = ?2 AND deleted_at_ms IS NULL",
                    params![owner_id.as_str(), name],
                    |r| r.get(0),
                )
                .map_err(translate)?;
            Ok(count > 0)
        })
        .await
    }

    async fn increment_active_tasks(&self, _ctx: &Context, id: WorkspaceId, now_ms: u64) -> CoreResult<Workspace> {
        self.blocking(move |conn| adjust_active_tasks(conn, &id, 1, now_ms)).await
    }

    async fn decrement_active_tasks(&self, _ctx: &Context, id: WorkspaceId, now_ms: u64) -> CoreResult<Workspace> {
        self.blocking(move |conn| adjust_active_tasks(conn, &id, -1, now_ms)).await
    }
}

fn adjust_active_tasks(conn: &Connection, id: &WorkspaceId, delta: i64, now_ms: u64) -> CoreResult<Workspace> {
    let tx = conn.unchecked_transaction().map_err(translate)?;
    let current = tx
        .query_row("SELECT * FROM workspaces WHERE id = ?1 AND deleted_at_ms IS NULL", params![id.as_str()], workspace_from_row)
        .optional()
        .map_err(translate)?
        .transpose()?
        .ok_or_else(|| CoreError::not_found(format!("workspace {id}")))?;
    let active_tasks = if delta >= 0 { current.active_tasks + 1 } else { current.active_tasks.saturating_sub(1) };
    let new_version = current.version + 1;
    tx.execute(
        "UPDATE workspaces SET active_tasks = ?1, updated_at_ms = ?2, version = ?3 WHERE id = ?4",
        params![active_tasks, now_ms as i64, new_version as i64, id.as_str()],
    )
    .map_err(translate)?;
    tx.commit().map_err(translate)?;
    Ok(Workspace { active_tasks, updated_at_ms: now_ms, version: new_version, ..current })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<CoreResult<Project>> {
    let config_raw: String = row.get("config")?;
    let config = match serde_json::from_str(&config_raw) {
        Ok(v) => v,
        Err(e) => return Ok(Err(CoreError::internal(e.to_string()))),
    };
    Ok(Ok(Project {
        id: ProjectId::from_string(row.get::<_, String>("id")?),
        workspace_id: WorkspaceId::from_string(row.get::<_, String>("workspace_id")?),
        name: row.get("name")?,
        language: row.get("language")?,
        git_remote: row.get("git_remote")?,
        config,
        live_sessions: row.get::<_, i64>("live_sessions")? as u32,
        created_at_ms: row.get::<_, i64>("created_at_ms")? as u64,
        updated_at_ms: row.get::<_, i64>("updated_at_ms")? as u64,
        deleted_at_ms: row.get::<_, Option<i64>>("deleted_at_ms")?.map(|v| v as u64),
        version: row.get::<_, i64>("version")? as u64,
    }))
}

#[async_trait]
impl ProjectRepo for RelationalEngine {
    async fn create(&self, _ctx: &Context, project: Project) -> CoreResult<Project> {
        self.blocking(move |conn| {
            let config = serde_json::to_string(&project.config).map_err(|e| CoreError::internal(e.to_string()))?;
            conn.execute(
                "INSERT INTO projects (id, workspace_id, name, language, git_remote, config, live_sessions, created_at_ms, updated_at_ms, deleted_at_ms, version) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
                params![
                    project.id.as_str(),
                    project.workspace_id.as_str(),
                    project.name,
                    project.language,
                    project.git_remote,
                    config,
                    project.live_sessions,
                    project.created_at_ms as i64,
                    project.updated_at_ms as i64,
                    project.deleted_at_ms.map(|v| v as i64),
                    project.version as i64,
                ],
            )
            .map_err(translate)?;
            Ok(project)
        })
        .await
    }

    async fn get_by_id(&self, _ctx: &Context, id: ProjectId) -> CoreResult<Project> {
        self.blocking(move |conn| {
            conn.query_row("SELECT * FROM projects WHERE id = ?1 AND deleted_at_ms IS NULL", params![id.as_str()], project_from_row)
                .optional()
                .map_err(translate)?
                .transpose()?
                .ok_or_else(|| CoreError::not_found(format!("project {id}")))
        })
        .await
    }

    async fn get_by_workspace(&self, _ctx: &Context, workspace_id: WorkspaceId, paging: Paging) -> CoreResult<Vec<Project>> {
        self.blocking(move |conn| {
            let mut stmt = conn
                .prepare_cached("SELECT * FROM projects WHERE workspace_id = ?1 AND deleted_at_ms IS NULL ORDER BY created_at_ms LIMIT ?2 OFFSET ?3")
                .map_err(translate)?;
            let rows = stmt.query_map(params![workspace_id.as_str(), paging.limit, paging.offset], project_from_row).map_err(translate)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(translate)?.into_iter().collect()
        })
        .await
    }

    async fn update(&self, _ctx: &Context, id: ProjectId, patch: Patch<ProjectFields>) -> CoreResult<Project> {
        self.blocking(move |conn| {
            let tx = conn.unchecked_transaction().map_err(translate)?;
            let current = tx
                .query_row("SELECT * FROM projects WHERE id = ?1 AND deleted_at_ms IS NULL", params![id.as_str()], project_from_row)
                .optional()
                .map_err(translate)?
                .transpose()?
                .ok_or_else(|| CoreError::not_found(format!("project {id}")))?;
            if current.version != patch.expected_version {
                return Err(CoreError::version_mismatch(patch.expected_version, current.version));
            }
            let name = patch.fields.name.unwrap_or(current.name);
            let language = patch.fields.language.unwrap_or(current.language);
            let git_remote = patch.fields.git_remote.unwrap_or(current.git_remote);
            let config = patch.fields.config.unwrap_or(current.config);
            let new_version = current.version + 1;
            let config_raw = serde_json::to_string(&config).map_err(|e| CoreError::internal(e.to_string()))?;
            tx.execute(
                "UPDATE projects SET name = ?1, language = ?2, git_remote = ?3, config = ?4, version = ?5 WHERE id = ?6",
                params![name, language, git_remote, config_raw, new_version as i64, id.as_str()],
            )
            .map_err(translate)?;
            tx.commit().map_err(translate)?;
            Ok(Project { name, language, git_remote, config, version: new_version, ..current })
        })
        .await
    }

    async fn delete(&self, _ctx: &Context, id: ProjectId) -> CoreResult<()> {
        self.blocking(move |conn| {
            let live: i64 = conn
                .query_row("SELECT live_sessions FROM projects WHERE id = ?1", params![id.as_str()], |r| r.get(0))
                .optional()
                .map_err(translate)?
                .ok_or_else(|| CoreError::not_found(format!("project {id}")))?;
            if live != 0 {
                return Err(CoreError::conflict("project has live sessions"));
            }
            conn.execute("UPDATE projects SET deleted_at_ms = updated_at_ms WHERE id = ?1", params![id.as_str()]).map_err(translate)?;
            Ok(())
        })
        .await
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Project>> {
        self.blocking(move |conn| {
            let mut stmt = conn
                .prepare_cached("SELECT * FROM projects WHERE deleted_at_ms IS NULL ORDER BY created_at_ms LIMIT ?1 OFFSET ?2")
                .map_err(translate)?;
            let rows = stmt.query_map(params![paging.limit, paging.offset], project_from_row).map_err(translate)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(translate)?.into_iter().collect()
        })
        .await
    }

    async fn register_session(&self, _ctx: &Context, id: ProjectId, now_ms: u64) -> CoreResult<Project> {
        self.blocking(move |conn| adjust_live_sessions(conn, &id, 1, now_ms)).await
    }

    async fn release_session(&self, _ctx: &Context, id: ProjectId, now_ms: u64) -> CoreResult<Project> {
        self.blocking(move |conn| adjust_live_sessions(conn, &id, -1, now_ms)).await
    }
}

fn adjust_live_sessions(conn: &Connection, id: &ProjectId, delta: i64, now_ms: u64) -> CoreResult<Project> {
    let tx = conn.unchecked_transaction().map_err(translate)?;
    let current = tx
        .query_row("SELECT * FROM projects WHERE id = ?1 AND deleted_at_ms IS NULL", params![id.as_str()], project_from_row)
        .optional()
        .map_err(translate)?
        .transpose()?
        .ok_or_else(|| CoreError::not_found(format!("project {id}")))?;
    let live_sessions = if delta >= 0 { current.live_sessions + 1 } else { current.live_sessions.saturating_sub(1) };
    let new_version = current.version + 1;
    tx.execute(
        "UPDATE projects SET live_sessions = ?1, updated_at_ms = ?2, version = ?3 WHERE id = ?4",
        params![live_sessions, now_ms as i64, new_version as i64, id.as_str()],
    )
    .map_err(translate)?;
    tx.commit().map_err(translate)?;
    Ok(Project { live_sessions, updated_at_ms: now_ms, version: new_version, ..current })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<CoreResult<Session>> {
    let status_raw: String = row.get("status")?;
    let status = match parse_session_status(&status_raw) {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };
    let metadata_raw: String = row.get("metadata")?;
    let metadata = match serde_json::from_str(&metadata_raw) {
        Ok(v) => v,
        Err(e) => return Ok(Err(CoreError::internal(e.to_string()))),
    };
    Ok(Ok(Session {
        id: SessionId::from_string(row.get::<_, String>("id")?),
        project_id: ProjectId::from_string(row.get::<_, String>("project_id")?),
        status,
        process_id: row.get("process_id")?,
        started_at_ms: row.get::<_, Option<i64>>("started_at_ms")?.map(|v| v as u64),
        ended_at_ms: row.get::<_, Option<i64>>("ended_at_ms")?.map(|v| v as u64),
        last_active_ms: row.get::<_, i64>("last_active_ms")? as u64,
        command_count: row.get::<_, i64>("command_count")? as u64,
        metadata,
        version: row.get::<_, i64>("version")? as u64,
    }))
}

#[async_trait]
impl SessionRepo for RelationalEngine {
    async fn create(&self, _ctx: &Context, session: Session) -> CoreResult<Session> {
        self.blocking(move |conn| {
            let metadata = serde_json::to_string(&session.metadata).map_err(|e| CoreError::internal(e.to_string()))?;
            conn.execute(
                "INSERT INTO sessions (id, project_id, status, process_id, started_at_ms, ended_at_ms, last_active_ms, command_count, metadata, version) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                params![
                    session.id.as_str(),
                    session.project_id.as_str(),
                    session_status_str(session.status),
                    session.process_id,
                    session.started_at_ms.map(|v| v as i64),
                    session.ended_at_ms.map(|v| v as i64),
                    session.last_active_ms as i64,
                    session.command_count as i64,
                    metadata,
                    session.version as i64,
                ],
            )
            .map_err(translate)?;
            Ok(session)
        })
        .await
    }

    async fn get_by_id(&self, _ctx: &Context, id: SessionId) -> CoreResult<Session> {
        self.blocking(move |conn| {
            conn.query_row("SELECT * FROM sessions WHERE id = ?1", params![id.as_str()], session_from_row)
                .optional()
                .map_err(translate)?
                .transpose()?
                .ok_or_else(|| CoreError::not_found(format!("session {id}")))
        })
        .await
    }

    async fn get_by_project(&self, _ctx: &Context, project_id: ProjectId, paging: Paging) -> CoreResult<Vec<Session>> {
        self.blocking(move |conn| {
            let mut stmt = conn
                .prepare_cached("SELECT * FROM sessions WHERE project_id = ?1 ORDER BY last_active_ms DESC LIMIT ?2 OFFSET ?3")
                .map_err(translate)?;
            let rows = stmt.query_map(params![project_id.as_str(), paging.limit, paging.offset], session_from_row).map_err(translate)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(translate)?.into_iter().collect()
        })
        .await
    }

    async fn get_by_process_id(&self, _ctx: &Context, process_id: &str) -> CoreResult<Session> {
        let process_id = process_id.to_string();
        self.blocking(move |conn| {
            conn.query_row("SELECT * FROM sessions WHERE process_id = ?1", params![process_id], session_from_row)
                .optional()
                .map_err(translate)?
                .transpose()?
                .ok_or_else(|| CoreError::not_found(format!("session bound to process {process_id}")))
        })
        .await
    }

    async fn update(&self, _ctx: &Context, id: SessionId, patch: Patch<SessionFields>) -> CoreResult<Session> {
        self.blocking(move |conn| {
            let tx = conn.unchecked_transaction().map_err(translate)?;
            let current = tx
                .query_row("SELECT * FROM sessions WHERE id = ?1", params![id.as_str()], session_from_row)
                .optional()
                .map_err(translate)?
                .transpose()?
                .ok_or_else(|| CoreError::not_found(format!("session {id}")))?;
            if current.version != patch.expected_version {
                return Err(CoreError::version_mismatch(patch.expected_version, current.version));
            }
            let status = patch.fields.status.unwrap_or(current.status);
            let metadata = patch.fields.metadata.unwrap_or(current.metadata);
            let new_version = current.version + 1;
            let metadata_raw = serde_json::to_string(&metadata).map_err(|e| CoreError::internal(e.to_string()))?;
            tx.execute(
                "UPDATE sessions SET status = ?1, metadata = ?2, version = ?3 WHERE id = ?4",
                params![session_status_str(status), metadata_raw, new_version as i64, id.as_str()],
            )
            .map_err(translate)?;
            tx.commit().map_err(translate)?;
            Ok(Session { status, metadata, version: new_version, ..current })
        })
        .await
    }

    async fn delete(&self, _ctx: &Context, id: SessionId) -> CoreResult<()> {
        self.blocking(move |conn| {
            let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.as_str()]).map_err(translate)?;
            if changed == 0 {
                return Err(CoreError::not_found(format!("session {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Session>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM sessions ORDER BY last_active_ms DESC LIMIT ?1 OFFSET ?2").map_err(translate)?;
            let rows = stmt.query_map(params![paging.limit, paging.offset], session_from_row).map_err(translate)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(translate)?.into_iter().collect()
        })
        .await
    }

    async fn activate(&self, _ctx: &Context, id: SessionId, process_id: String, now_ms: u64) -> CoreResult<Session> {
        self.blocking(move |conn| apply_session(conn, &id, |s| s.activate(process_id, now_ms))).await
    }

    async fn go_idle(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        self.blocking(move |conn| apply_session(conn, &id, |s| s.go_idle(now_ms))).await
    }

    async fn record_command(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        self.blocking(move |conn| apply_session(conn, &id, |s| { s.record_command(now_ms); Ok(()) })).await
    }

    async fn record_activity(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        self.blocking(move |conn| apply_session(conn, &id, |s| { s.record_activity(now_ms); Ok(()) })).await
    }

    async fn begin_end(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        self.blocking(move |conn| apply_session(conn, &id, |s| s.begin_end(now_ms))).await
    }

    async fn finish_end(&self, _ctx: &Context, id: SessionId, now_ms: u64) -> CoreResult<Session> {
        self.blocking(move |conn| apply_session(conn, &id, |s| s.finish_end(now_ms))).await
    }
}

/// Run an FSM transition against the stored session row and persist every
/// field the transition could have touched. Shared by every `SessionRepo`
/// transition method above.
fn apply_session<F>(conn: &Connection, id: &SessionId, f: F) -> CoreResult<Session>
where
    F: FnOnce(&mut Session) -> Result<(), SessionIllegalTransition>,
{
    let tx = conn.unchecked_transaction().map_err(translate)?;
    let mut current = tx
        .query_row("SELECT * FROM sessions WHERE id = ?1", params![id.as_str()], session_from_row)
        .optional()
        .map_err(translate)?
        .transpose()?
        .ok_or_else(|| CoreError::not_found(format!("session {id}")))?;
    f(&mut current).map_err(|e| CoreError::conflict(e.to_string()))?;
    let metadata_raw = serde_json::to_string(&current.metadata).map_err(|e| CoreError::internal(e.to_string()))?;
    tx.execute(
        "UPDATE sessions SET status = ?1, process_id = ?2, started_at_ms = ?3, ended_at_ms = ?4, last_active_ms = ?5, command_count = ?6, metadata = ?7, version = ?8 WHERE id = ?9",
        params![
            session_status_str(current.status),
            current.process_id,
            current.started_at_ms.map(|v| v as i64),
            current.ended_at_ms.map(|v| v as i64),
            current.last_active_ms as i64,
            current.command_count as i64,
            metadata_raw,
            current.version as i64,
            id.as_str(),
        ],
    )
    .map_err(translate)?;
    tx.commit().map_err(translate)?;
    Ok(current)
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<CoreResult<Task>> {
    let status_raw: String = row.get("status")?;
    let status = match parse_task_status(&status_raw) {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };
    let failure_raw: Option<String> = row.get("failure")?;
    let failure = match failure_raw.map(|raw| serde_json::from_str(&raw)) {
        Some(Ok(v)) => Some(v),
        Some(Err(e)) => return Ok(Err(CoreError::internal(e.to_string()))),
        None => None,
    };
    Ok(Ok(Task {
        id: TaskId::from_string(row.get::<_, String>("id")?),
        session_id: SessionId::from_string(row.get::<_, String>("session_id")?),
        command: row.get("command")?,
        status,
        exit_code: row.get::<_, Option<i64>>("exit_code")?.map(|v| v as i32),
        output_bytes: row.get::<_, i64>("output_bytes")? as u64,
        error_bytes: row.get::<_, i64>("error_bytes")? as u64,
        failure,
        started_at_ms: row.get::<_, Option<i64>>("started_at_ms")?.map(|v| v as u64),
        completed_at_ms: row.get::<_, Option<i64>>("completed_at_ms")?.map(|v| v as u64),
        duration_ms: row.get::<_, Option<i64>>("duration_ms")?.map(|v| v as u64),
        version: row.get::<_, i64>("version")? as u64,
    }))
}

#[async_trait]
impl TaskRepo for RelationalEngine {
    async fn create(&self, _ctx: &Context, task: Task) -> CoreResult<Task> {
        self.blocking(move |conn| {
            let failure = task.failure.as_ref().map(serde_json::to_string).transpose().map_err(|e| CoreError::internal(e.to_string()))?;
            conn.execute(
                "INSERT INTO tasks (id, session_id, command, status, exit_code, output_bytes, error_bytes, failure, started_at_ms, completed_at_ms, duration_ms, version) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
                params![
                    task.id.as_str(),
                    task.session_id.as_str(),
                    task.command,
                    task_status_str(task.status),
                    task.exit_code,
                    task.output_bytes as i64,
                    task.error_bytes as i64,
                    failure,
                    task.started_at_ms.map(|v| v as i64),
                    task.completed_at_ms.map(|v| v as i64),
                    task.duration_ms.map(|v| v as i64),
                    task.version as i64,
                ],
            )
            .map_err(translate)?;
            Ok(task)
        })
        .await
    }

    async fn get_by_id(&self, _ctx: &Context, id: TaskId) -> CoreResult<Task> {
        self.blocking(move |conn| {
            conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id.as_str()], task_from_row)
                .optional()
                .map_err(translate)?
                .transpose()?
                .ok_or_else(|| CoreError::not_found(format!("task {id}")))
        })
        .await
    }

    async fn get_by_session(&self, _ctx: &Context, session_id: SessionId, paging: Paging) -> CoreResult<Vec<Task>> {
        self.blocking(move |conn| {
            let mut stmt = conn
                .prepare_cached("SELECT * FROM tasks WHERE session_id = ?1 ORDER BY rowid LIMIT ?2 OFFSET ?3")
                .map_err(translate)?;
            let rows = stmt.query_map(params![session_id.as_str(), paging.limit, paging.offset], task_from_row).map_err(translate)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(translate)?.into_iter().collect()
        })
        .await
    }

    async fn update(&self, _ctx: &Context, id: TaskId, patch: Patch<TaskFields>) -> CoreResult<Task> {
        self.blocking(move |conn| {
            let tx = conn.unchecked_transaction().map_err(translate)?;
            let current = tx
                .query_row("SELECT * FROM tasks WHERE id = ?1", params![id.as_str()], task_from_row)
                .optional()
                .map_err(translate)?
                .transpose()?
                .ok_or_else(|| CoreError::not_found(format!("task {id}")))?;
            if current.version != patch.expected_version {
                return Err(CoreError::version_mismatch(patch.expected_version, current.version));
            }
            let status = patch.fields.status.unwrap_or(current.status);
            let exit_code = patch.fields.exit_code.unwrap_or(current.exit_code);
            let new_version = current.version + 1;
            tx.execute(
                "UPDATE tasks SET status = ?1, exit_code = ?2, version = ?3 WHERE id = ?4",
                params![task_status_str(status), exit_code, new_version as i64, id.as_str()],
            )
            .map_err(translate)?;
            tx.commit().map_err(translate)?;
            Ok(Task { status, exit_code, version: new_version, ..current })
        })
        .await
    }

    async fn delete(&self, _ctx: &Context, id: TaskId) -> CoreResult<()> {
        self.blocking(move |conn| {
            let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.as_str()]).map_err(translate)?;
            if changed == 0 {
                return Err(CoreError::not_found(format!("task {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn list(&self, _ctx: &Context, paging: Paging) -> CoreResult<Vec<Task>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM tasks ORDER BY rowid LIMIT ?1 OFFSET ?2").map_err(translate)?;
            let rows = stmt.query_map(params![paging.limit, paging.offset], task_from_row).map_err(translate)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(translate)?.into_iter().collect()
        })
        .await
    }

    async fn search_by_command_prefix(&self, _ctx: &Context, prefix: &str, paging: Paging) -> CoreResult<Vec<Task>> {
        let like = format!("{}%", prefix.replace('%', "\\%"));
        self.blocking(move |conn| {
            let mut stmt = conn
                .prepare_cached("SELECT * FROM tasks WHERE command LIKE ?1 ESCAPE '\\' ORDER BY rowid LIMIT ?2 OFFSET ?3")
                .map_err(translate)?;
            let rows = stmt.query_map(params![like, paging.limit, paging.offset], task_from_row).map_err(translate)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(translate)?.into_iter().collect()
        })
        .await
    }

    async fn get_running_count(&self, _ctx: &Context, workspace_id: WorkspaceId) -> CoreResult<u64> {
        self.blocking(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM tasks t JOIN sessions s ON s.id = t.session_id JOIN projects p ON p.id = s.project_id WHERE p.workspace_id = ?1 AND t.status = 'running'",
                    params![workspace_id.as_str()],
                    |r| r.get(0),
                )
                .map_err(translate)?;
            Ok(count as u64)
        })
        .await
    }

    async fn start(&self, _ctx: &Context, id: TaskId, now_ms: u64) -> CoreResult<Task> {
        self.blocking(move |conn| apply_task(conn, &id, |t| t.start(now_ms))).await
    }

    async fn record_output(&self, _ctx: &Context, id: TaskId, bytes: u64) -> CoreResult<Task> {
        self.blocking(move |conn| apply_task(conn, &id, |t| { t.record_output(bytes); Ok(()) })).await
    }

    async fn record_error(&self, _ctx: &Context, id: TaskId, bytes: u64) -> CoreResult<Task> {
        self.blocking(move |conn| apply_task(conn, &id, |t| { t.record_error(bytes); Ok(()) })).await
    }

    async fn complete(&self, _ctx: &Context, id: TaskId, exit_code: i32, now_ms: u64) -> CoreResult<Task> {
        self.blocking(move |conn| apply_task(conn, &id, |t| t.complete(exit_code, now_ms))).await
    }

    async fn fail(&self, _ctx: &Context, id: TaskId, reason: FailureReason, exit_code: Option<i32>, now_ms: u64) -> CoreResult<Task> {
        self.blocking(move |conn| apply_task(conn, &id, |t| t.fail(reason, exit_code, now_ms))).await
    }

    async fn cancel(&self, _ctx: &Context, id: TaskId, now_ms: u64) -> CoreResult<Task> {
        self.blocking(move |conn| apply_task(conn, &id, |t| t.cancel(now_ms))).await
    }
}

/// Mirror of `apply_session` for tasks.
fn apply_task<F>(conn: &Connection, id: &TaskId, f: F) -> CoreResult<Task>
where
    F: FnOnce(&mut Task) -> Result<(), TaskIllegalTransition>,
{
    let tx = conn.unchecked_transaction().map_err(translate)?;
    let mut current = tx
        .query_row("SELECT * FROM tasks WHERE id = ?1", params![id.as_str()], task_from_row)
        .optional()
        .map_err(translate)?
        .transpose()?
        .ok_or_else(|| CoreError::not_found(format!("task {id}")))?;
    f(&mut current).map_err(|e| CoreError::conflict(e.to_string()))?;
    let failure_raw = current.failure.as_ref().map(serde_json::to_string).transpose().map_err(|e| CoreError::internal(e.to_string()))?;
    tx.execute(
        "UPDATE tasks SET status = ?1, exit_code = ?2, output_bytes = ?3, error_bytes = ?4, failure = ?5, started_at_ms = ?6, completed_at_ms = ?7, duration_ms = ?8, version = ?9 WHERE id = ?10",
        params![
            task_status_str(current.status),
            current.exit_code,
            current.output_bytes as i64,
            current.error_bytes as i64,
            failure_raw,
            current.started_at_ms.map(|v| v as i64),
            current.completed_at_ms.map(|v| v as i64),
            current.duration_ms.map(|v| v as i64),
            current.version as i64,
            id.as_str(),
        ],
    )
    .map_err(translate)?;
    tx.commit().map_err(translate)?;
    Ok(current)
}

impl RepoBundle for RelationalEngine {
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

/// A relational transaction view. Beginning a `RelationalTx` just reuses the
/// same engine handle for the lifetime of the `run_in_tx` closure; each repo
/// call below still opens and commits its own `unchecked_transaction`, so
/// `RelationalTx` groups calls for the caller without making them
/// all-or-nothing. `commit`/`rollback` are no-ops.
pub struct RelationalTx {
    engine: RelationalEngine,
}

impl RelationalTx {
    pub fn new(engine: RelationalEngine) -> Self {
        Self { engine }
    }
}

impl RepoBundle for RelationalTx {
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
impl Tx for RelationalTx {
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
