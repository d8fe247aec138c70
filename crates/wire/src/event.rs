// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Out,
    Err,
    Sys,
}

/// One line of output delivered to a subscriber. Untagged: it carries no
/// `type` field of its own, unlike [`ControlMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub seq: u64,
    pub ts: String,
    pub stream: StreamKind,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Tagged control messages interleaved with [`StreamEvent`]s on the same
/// subscriber queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Terminal {
        status: TerminalStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Ping,
    Pong,
}

/// Anything a subscriber's send queue can carry. Untagged: serialization
/// tries each variant's own shape (`StreamEvent` has no `type` field;
/// `ControlMessage` always does), matching the two JSON shapes verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Event(StreamEvent),
    Control(ControlMessage),
}

impl From<StreamEvent> for OutboundMessage {
    fn from(event: StreamEvent) -> Self {
        OutboundMessage::Event(event)
    }
}

impl From<ControlMessage> for OutboundMessage {
    fn from(message: ControlMessage) -> Self {
        OutboundMessage::Control(message)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
