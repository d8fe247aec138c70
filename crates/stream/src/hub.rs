// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hub: a registry of topics keyed by task id, created on task start and
//! removed once every subscriber has drained the terminal event.

use crate::config::HubConfig;
use crate::subscriber::Subscriber;
use crate::topic::Topic;
use ctlplane_core::{CoreError, CoreResult, TaskId};
use ctlplane_wire::{StreamKind, TerminalStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Hub {
    config: HubConfig,
    topics: Mutex<HashMap<TaskId, Arc<Topic>>>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self { config, topics: Mutex::new(HashMap::new()) }
    }

    pub fn create_topic(&self, task_id: TaskId) -> Arc<Topic> {
        let mut topics = self.topics.lock();
        topics.entry(task_id).or_insert_with(|| Arc::new(Topic::new(task_id, self.config))).clone()
    }

    pub fn topic(&self, task_id: TaskId) -> Option<Arc<Topic>> {
        self.topics.lock().get(&task_id).cloned()
    }

    pub fn publish_line(&self, task_id: TaskId, stream: StreamKind, payload: String, ts: String) {
        if let Some(topic) = self.topic(task_id) {
            topic.publish_line(stream, payload, ts);
        } else {
            tracing::warn!(%task_id, "publish_line: no topic registered");
        }
    }

    /// Close the topic but keep it registered: late subscribers still need
    /// to reach it for the residual ring + terminal. The lifecycle
    /// orchestrator calls `evict_topic` once it's sure no subscriber will
    /// arrive late enough to matter (e.g. after the task record itself is
    /// pruned).
    pub fn close_topic(&self, task_id: TaskId, status: TerminalStatus, exit_code: Option<i32>, reason: Option<String>) {
        if let Some(topic) = self.topic(task_id) {
            topic.close(status, exit_code, reason);
        }
    }

    pub fn evict_topic(&self, task_id: TaskId) {
        self.topics.lock().remove(&task_id);
    }

    pub fn subscribe(&self, task_id: TaskId, since_seq: Option<u64>) -> CoreResult<Subscriber> {
        let topic = self
            .topic(task_id)
            .ok_or_else(|| CoreError::not_found(format!("no stream topic for task {task_id}")))?;
        Ok(topic.subscribe(since_seq))
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
