// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hub's internal event record, distinct from [`ctlplane_wire::StreamEvent`]:
//! this one carries no `dropped` count of its own (the ring stores the events
//! exactly as produced; `dropped` is a per-subscriber back-pressure artifact
//! merged in at delivery time).

use ctlplane_wire::{StreamEvent, StreamKind};

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub seq: u64,
    pub stream: StreamKind,
    pub ts: String,
    pub payload: String,
}

impl Event {
    /// Approximate size in bytes, used for the ring's byte-size bound.
    pub fn approx_size(&self) -> usize {
        self.payload.len() + self.ts.len() + 16
    }

    pub fn to_wire(&self, dropped: Option<u64>) -> StreamEvent {
        StreamEvent { seq: self.seq, ts: self.ts.clone(), stream: self.stream, payload: self.payload.clone(), dropped }
    }
}
