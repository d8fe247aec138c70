// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identifier, status, and finite state machine.
//!
//! A task is one command/prompt execution within a session. Its FSM is
//! `pending -> running -> (completed | failed | cancelled)`; anything past
//! `running` is terminal and append-only.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a task.
    pub struct TaskId("tsk_");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

/// Why a task was transitioned to `failed` outside of a normal non-zero
/// exit, surfaced to callers for diagnostics and recovery bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    NonZeroExit,
    ProcessCrashed,
    ParseError { detail: String },
    /// The control plane restarted while this task was `running` and no
    /// live supervisor slot could be reattached to it.
    HostRestarted,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal task transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// One command/prompt execution within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub session_id: SessionId,
    pub command: String,
    pub status: TaskStatus,
    pub exit_code: Option<i32>,
    pub output_bytes: u64,
    pub error_bytes: u64,
    pub failure: Option<FailureReason>,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub version: u64,
}

impl Task {
    pub fn new(session_id: SessionId, command: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            session_id,
            command: command.into(),
            status: TaskStatus::Pending,
            exit_code: None,
            output_bytes: 0,
            error_bytes: 0,
            failure: None,
            started_at_ms: None,
            completed_at_ms: None,
            duration_ms: None,
            version: 1,
        }
    }

    pub fn start(&mut self, now_ms: u64) -> Result<(), IllegalTransition> {
        match self.status {
            TaskStatus::Pending => {
                self.status = TaskStatus::Running;
                self.started_at_ms = Some(now_ms);
                self.touch();
                Ok(())
            }
            other => Err(IllegalTransition { from: other, to: TaskStatus::Running }),
        }
    }

    pub fn record_output(&mut self, bytes: u64) {
        self.output_bytes += bytes;
    }

    pub fn record_error(&mut self, bytes: u64) {
        self.error_bytes += bytes;
    }

    fn finish(&mut self, status: TaskStatus, now_ms: u64) -> Result<(), IllegalTransition> {
        if self.status != TaskStatus::Running {
            return Err(IllegalTransition { from: self.status, to: status });
        }
        self.status = status;
        self.completed_at_ms = Some(now_ms);
        self.duration_ms = self.started_at_ms.map(|started| now_ms.saturating_sub(started));
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self, exit_code: i32, now_ms: u64) -> Result<(), IllegalTransition> {
        self.finish(TaskStatus::Completed, now_ms)?;
        self.exit_code = Some(exit_code);
        Ok(())
    }

    pub fn fail(&mut self, reason: FailureReason, exit_code: Option<i32>, now_ms: u64) -> Result<(), IllegalTransition> {
        self.finish(TaskStatus::Failed, now_ms)?;
        self.failure = Some(reason);
        self.exit_code = exit_code;
        Ok(())
    }

    pub fn cancel(&mut self, now_ms: u64) -> Result<(), IllegalTransition> {
        self.finish(TaskStatus::Cancelled, now_ms)
    }

    fn touch(&mut self) {
        self.version += 1;
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            command: String = "echo hello",
        }
        set {
            session_id: SessionId = SessionId::new(),
            status: TaskStatus = TaskStatus::Pending,
            exit_code: Option<i32> = None,
            output_bytes: u64 = 0,
            error_bytes: u64 = 0,
            failure: Option<FailureReason> = None,
            started_at_ms: Option<u64> = None,
            completed_at_ms: Option<u64> = None,
            duration_ms: Option<u64> = None,
            version: u64 = 1,
        }
        computed {
            id: TaskId = TaskId::new(),
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
