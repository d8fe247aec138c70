// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A live Claude child process and its bookkeeping, as tracked by the pool.

use ctlplane_core::WorkspaceId;
use ctlplane_isolation::{MountHandle, ProcessHandle};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Spawning,
    Idle,
    Busy,
    Draining,
    Dead,
}

/// A unique, process-lifetime slot identifier. Not persisted; slots don't
/// survive a daemon restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

pub struct Slot {
    pub id: SlotId,
    pub workspace_id: WorkspaceId,
    pub state: SlotState,
    pub process: Arc<Mutex<ProcessHandle>>,
    pub mount: MountHandle,
    pub last_used: Instant,
    pub busy_count_since_start: u64,
}

impl Slot {
    /// True if this slot can be handed out for a task bound to `workspace_id`.
    pub fn matches(&self, workspace_id: WorkspaceId) -> bool {
        self.state == SlotState::Idle && self.workspace_id == workspace_id
    }
}
