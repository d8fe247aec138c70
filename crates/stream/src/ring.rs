// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded replay buffer for one topic: the source of truth for subscriber
//! reconnects. Bounded by event count *and* total payload bytes, whichever
//! is hit first.

use crate::event::Event;
use std::collections::VecDeque;

pub struct RingBuffer {
    events: VecDeque<Event>,
    max_events: usize,
    max_bytes: usize,
    bytes: usize,
}

impl RingBuffer {
    pub fn new(max_events: usize, max_bytes: usize) -> Self {
        Self { events: VecDeque::new(), max_events, max_bytes, bytes: 0 }
    }

    pub fn push(&mut self, event: Event) {
        self.bytes += event.approx_size();
        self.events.push_back(event);
        while self.events.len() > self.max_events || self.bytes > self.max_bytes {
            let Some(evicted) = self.events.pop_front() else { break };
            self.bytes -= evicted.approx_size();
        }
    }

    /// Events with `seq > since_seq`, oldest first. Exclusive of
    /// `since_seq` itself: a subscriber that last saw `seq` and reconnects
    /// with `since_seq = seq` gets only what it hasn't seen yet. If
    /// `since_seq` is older than every retained event, returns everything
    /// still held.
    pub fn since(&self, since_seq: u64) -> Vec<Event> {
        self.events.iter().filter(|e| e.seq > since_seq).cloned().collect()
    }

    pub fn oldest_seq(&self) -> Option<u64> {
        self.events.front().map(|e| e.seq)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
