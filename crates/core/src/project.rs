// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project identifier and record.
//!
//! A project is a named subtree of a workspace with its own configuration
//! (language, git info, free-form JSON config). It owns sessions and is
//! soft-deletable only if it has no live sessions.

use crate::workspace::WorkspaceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

crate::define_id! {
    /// Unique identifier for a project.
    pub struct ProjectId("prj_");
}

/// A named subtree of a workspace with its own configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub language: Option<String>,
    pub git_remote: Option<String>,
    pub config: Value,
    pub live_sessions: u32,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub deleted_at_ms: Option<u64>,
    pub version: u64,
}

impl Project {
    pub fn new(workspace_id: WorkspaceId, name: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: ProjectId::new(),
            workspace_id,
            name: name.into(),
            language: None,
            git_remote: None,
            config: Value::Null,
            live_sessions: 0,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            deleted_at_ms: None,
            version: 1,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at_ms.is_some()
    }

    pub fn can_delete(&self) -> bool {
        self.live_sessions == 0
    }

    pub fn register_session(&mut self, now_ms: u64) {
        self.live_sessions += 1;
        self.touch(now_ms);
    }

    pub fn release_session(&mut self, now_ms: u64) {
        self.live_sessions = self.live_sessions.saturating_sub(1);
        self.touch(now_ms);
    }

    fn touch(&mut self, now_ms: u64) {
        self.updated_at_ms = now_ms;
        self.version += 1;
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct ProjectBuilder => Project {
        into {
            name: String = "test-project",
        }
        set {
            workspace_id: WorkspaceId = WorkspaceId::new(),
            language: Option<String> = None,
            git_remote: Option<String> = None,
            config: Value = Value::Null,
            live_sessions: u32 = 0,
            created_at_ms: u64 = 1_000,
            updated_at_ms: u64 = 1_000,
            version: u64 = 1,
        }
        option {
            deleted_at_ms: u64 = None,
        }
        computed {
            id: ProjectId = ProjectId::new(),
        }
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
