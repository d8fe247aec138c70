// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-through cache keyed by entity kind + id, with per-kind TTLs and
//! synchronous pattern-based invalidation on write.

use ctlplane_core::Clock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Workspace,
    Project,
    Session,
    Task,
}

impl EntityKind {
    pub fn default_ttl(self) -> Duration {
        match self {
            EntityKind::Workspace => Duration::from_secs(600),
            EntityKind::Project => Duration::from_secs(300),
            EntityKind::Session => Duration::from_secs(120),
            EntityKind::Task => Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheTtls {
    pub workspace: Option<Duration>,
    pub project: Option<Duration>,
    pub session: Option<Duration>,
    pub task: Option<Duration>,
}

impl CacheTtls {
    fn ttl_for(&self, kind: EntityKind) -> Duration {
        let override_ttl = match kind {
            EntityKind::Workspace => self.workspace,
            EntityKind::Project => self.project,
            EntityKind::Session => self.session,
            EntityKind::Task => self.task,
        };
        override_ttl.unwrap_or_else(|| kind.default_ttl())
    }
}

struct Entry<V> {
    value: V,
    expires_at_ms: u64,
}

/// A small generic entry cache; one instance is used per entity kind by
/// [`EntityCache`] below.
pub struct Cache<C: Clock> {
    clock: C,
    ttls: CacheTtls,
    entries: Mutex<HashMap<(EntityKind, String), Entry<Arc<[u8]>>>>,
}

impl<C: Clock> Cache<C> {
    pub fn new(clock: C, ttls: CacheTtls) -> Self {
        Self { clock, ttls, entries: Mutex::new(HashMap::new()) }
    }

    pub fn put(&self, kind: EntityKind, id: &str, value: Arc<[u8]>) {
        let expires_at_ms = self.clock.epoch_ms() + self.ttls.ttl_for(kind).as_millis() as u64;
        self.entries.lock().insert((kind, id.to_string()), Entry { value, expires_at_ms });
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<Arc<[u8]>> {
        let mut entries = self.entries.lock();
        let key = (kind, id.to_string());
        match entries.get(&key) {
            Some(entry) if entry.expires_at_ms > self.clock.epoch_ms() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Invalidate every cached entry of `kind`. Called on any write to that
    /// entity kind; correctness over precision since individual-id
    /// invalidation would need key parsing for every write path.
    pub fn invalidate_kind(&self, kind: EntityKind) {
        self.entries.lock().retain(|(k, _), _| *k != kind);
    }

    pub fn invalidate(&self, kind: EntityKind, id: &str) {
        self.entries.lock().remove(&(kind, id.to_string()));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
