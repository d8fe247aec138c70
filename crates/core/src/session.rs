// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifier, status, and finite state machine.
//!
//! A session is a logical conversation context bound to a project. Its
//! FSM is `pending -> active -> idle -> ended`, with `active <-> idle`
//! cycling as tasks start and go quiet, and `any -> ending -> ended` on
//! explicit close.

use crate::project::ProjectId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a session.
    pub struct SessionId("ses_");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Active,
    Idle,
    Ending,
    Ended,
}

crate::simple_display! {
    SessionStatus {
        Pending => "pending",
        Active => "active",
        Idle => "idle",
        Ending => "ending",
        Ended => "ended",
    }
}

/// An attempted session transition that the FSM does not allow.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal session transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

/// A logical conversation context bound to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub project_id: ProjectId,
    pub status: SessionStatus,
    /// The supervisor slot currently bound, if any. At most one at a time.
    pub process_id: Option<String>,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub last_active_ms: u64,
    pub command_count: u64,
    pub metadata: Value,
    pub version: u64,
}

impl Session {
    pub fn new(project_id: ProjectId, now_ms: u64) -> Self {
        Self {
            id: SessionId::new(),
            project_id,
            status: SessionStatus::Pending,
            process_id: None,
            started_at_ms: None,
            ended_at_ms: None,
            last_active_ms: now_ms,
            command_count: 0,
            metadata: Value::Null,
            version: 1,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    /// Transition on task start: `pending`/`idle` -> `active`.
    pub fn activate(&mut self, process_id: impl Into<String>, now_ms: u64) -> Result<(), IllegalTransition> {
        match self.status {
            SessionStatus::Pending | SessionStatus::Idle => {
                self.status = SessionStatus::Active;
                self.process_id = Some(process_id.into());
                if self.started_at_ms.is_none() {
                    self.started_at_ms = Some(now_ms);
                }
                self.touch(now_ms);
                Ok(())
            }
            SessionStatus::Active => Ok(()),
            other => Err(IllegalTransition { from: other, to: SessionStatus::Active }),
        }
    }

    /// Transition on inactivity timeout: `active` -> `idle`.
    pub fn go_idle(&mut self, now_ms: u64) -> Result<(), IllegalTransition> {
        match self.status {
            SessionStatus::Active => {
                self.status = SessionStatus::Idle;
                self.process_id = None;
                self.touch(now_ms);
                Ok(())
            }
            SessionStatus::Idle => Ok(()),
            other => Err(IllegalTransition { from: other, to: SessionStatus::Idle }),
        }
    }

    /// Record a completed task against this session.
    pub fn record_command(&mut self, now_ms: u64) {
        self.command_count += 1;
        self.last_active_ms = now_ms;
        self.touch(now_ms);
    }

    /// Bump the inactivity clock without a task having run, e.g. a client
    /// heartbeat. Does not affect `command_count`.
    pub fn record_activity(&mut self, now_ms: u64) {
        self.last_active_ms = now_ms;
        self.touch(now_ms);
    }

    /// Begin closing: any non-terminal state -> `ending`.
    pub fn begin_end(&mut self, now_ms: u64) -> Result<(), IllegalTransition> {
        if self.is_terminal() {
            return Err(IllegalTransition { from: self.status, to: SessionStatus::Ending });
        }
        self.status = SessionStatus::Ending;
        self.touch(now_ms);
        Ok(())
    }

    /// Finish closing: `ending` -> `ended`.
    pub fn finish_end(&mut self, now_ms: u64) -> Result<(), IllegalTransition> {
        match self.status {
            SessionStatus::Ending => {
                self.status = SessionStatus::Ended;
                self.process_id = None;
                self.ended_at_ms = Some(now_ms);
                self.touch(now_ms);
                Ok(())
            }
            other => Err(IllegalTransition { from: other, to: SessionStatus::Ended }),
        }
    }

    fn touch(&mut self, now_ms: u64) {
        self.version += 1;
        let _ = now_ms;
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct SessionBuilder => Session {
        set {
            project_id: ProjectId = ProjectId::new(),
            status: SessionStatus = SessionStatus::Pending,
            process_id: Option<String> = None,
            started_at_ms: Option<u64> = None,
            ended_at_ms: Option<u64> = None,
            last_active_ms: u64 = 1_000,
            command_count: u64 = 0,
            metadata: Value = Value::Null,
            version: u64 = 1,
        }
        computed {
            id: SessionId = SessionId::new(),
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
