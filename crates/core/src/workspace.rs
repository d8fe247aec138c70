// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace identifier and lifecycle status.
//!
//! A workspace is a user-owned, named reference to a host project
//! directory. It owns projects, which in turn own sessions and tasks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a workspace.
    pub struct WorkspaceId("wks_");
}

crate::define_id! {
    /// Unique identifier for a workspace owner (an external principal).
    pub struct OwnerId("own_");
}

/// Status of a workspace in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

crate::simple_display! {
    WorkspaceStatus {
        Active => "active",
        Inactive => "inactive",
        Archived => "archived",
    }
}

/// A user-owned, named reference to a host project directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub owner_id: OwnerId,
    pub name: String,
    pub project_path: PathBuf,
    pub status: WorkspaceStatus,
    /// Denormalized count of tasks currently in `running` state across this
    /// workspace. Must equal the real count at rest.
    pub active_tasks: u32,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub deleted_at_ms: Option<u64>,
    pub version: u64,
}

impl Workspace {
    pub fn new(owner_id: OwnerId, name: impl Into<String>, project_path: PathBuf, now_ms: u64) -> Self {
        Self {
            id: WorkspaceId::new(),
            owner_id,
            name: name.into(),
            project_path,
            status: WorkspaceStatus::Active,
            active_tasks: 0,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            deleted_at_ms: None,
            version: 1,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at_ms.is_some()
    }

    /// Soft-delete is only legal when nothing is running against this
    /// workspace.
    pub fn can_delete(&self) -> bool {
        self.active_tasks == 0
    }

    pub fn increment_active_tasks(&mut self, now_ms: u64) {
        self.active_tasks += 1;
        self.touch(now_ms);
    }

    pub fn decrement_active_tasks(&mut self, now_ms: u64) {
        self.active_tasks = self.active_tasks.saturating_sub(1);
        self.touch(now_ms);
    }

    fn touch(&mut self, now_ms: u64) {
        self.updated_at_ms = now_ms;
        self.version += 1;
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct WorkspaceBuilder => Workspace {
        into {
            owner_id: OwnerId = OwnerId::new(),
            name: String = "test-workspace",
        }
        set {
            project_path: PathBuf = PathBuf::from("/tmp/workspace"),
            status: WorkspaceStatus = WorkspaceStatus::Active,
            active_tasks: u32 = 0,
            created_at_ms: u64 = 1_000,
            updated_at_ms: u64 = 1_000,
            version: u64 = 1,
        }
        option {
            deleted_at_ms: u64 = None,
        }
        computed {
            id: WorkspaceId = WorkspaceId::new(),
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
