// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver-agnostic entry point. [`Engine`] wraps whichever driver
//! [`StorageConfig`] selects behind one [`RepoBundle`], and owns the
//! read-through [`Cache`] and [`Analyzer`] shared across calls.

use crate::cache::Cache;
use crate::config::{DriverKind, StorageConfig};
use crate::kv::{KvEngine, KvTx};
use crate::memory::{MemoryEngine, MemoryTx};
use crate::query::Analyzer;
use crate::relational::{RelationalEngine, RelationalTx};
use crate::repo::{RepoBundle, Tx};
use ctlplane_core::{Clock, CoreResult, SystemClock};
use std::sync::Arc;

#[derive(Clone)]
enum Driver {
    Memory(MemoryEngine),
    Relational(RelationalEngine),
    Kv(KvEngine),
}

impl RepoBundle for Driver {
    fn workspaces(&self) -> &dyn crate::repo::WorkspaceRepo {
        match self {
            Driver::Memory(e) => e.workspaces(),
            Driver::Relational(e) => e.workspaces(),
            Driver::Kv(e) => e.workspaces(),
        }
    }
    fn projects(&self) -> &dyn crate::repo::ProjectRepo {
        match self {
            Driver::Memory(e) => e.projects(),
            Driver::Relational(e) => e.projects(),
            Driver::Kv(e) => e.projects(),
        }
    }
    fn sessions(&self) -> &dyn crate::repo::SessionRepo {
        match self {
            Driver::Memory(e) => e.sessions(),
            Driver::Relational(e) => e.sessions(),
            Driver::Kv(e) => e.sessions(),
        }
    }
    fn tasks(&self) -> &dyn crate::repo::TaskRepo {
        match self {
            Driver::Memory(e) => e.tasks(),
            Driver::Relational(e) => e.tasks(),
            Driver::Kv(e) => e.tasks(),
        }
    }
}

/// The storage engine a daemon builds once at startup and shares across
/// every request. Holds the selected driver plus the read-through cache and
/// query analyzer that wrap it.
#[derive(Clone)]
pub struct Engine<C: Clock = SystemClock> {
    driver: Driver,
    pub cache: Arc<Cache<C>>,
    pub analyzer: Arc<Analyzer>,
}

impl Engine<SystemClock> {
    pub fn open(config: &StorageConfig) -> CoreResult<Self> {
        Self::open_with_clock(config, SystemClock::default())
    }
}

impl<C: Clock> Engine<C> {
    pub fn open_with_clock(config: &StorageConfig, clock: C) -> CoreResult<Self> {
        let driver = match config.driver {
            DriverKind::Memory => Driver::Memory(MemoryEngine::default()),
            DriverKind::Relational => Driver::Relational(RelationalEngine::open(&config.data_source)?),
            DriverKind::Kv => Driver::Kv(KvEngine::open(&config.data_source)?),
        };
        Ok(Self {
            driver,
            cache: Arc::new(Cache::new(clock, config.cache_ttls.clone())),
            analyzer: Arc::new(Analyzer::default()),
        })
    }

    pub fn repos(&self) -> &dyn RepoBundle {
        &self.driver
    }

    /// Hand back a `Tx` view over the driver's own repo bundle. Each repo
    /// call still commits itself internally (see the per-driver `mod.rs`
    /// files); a `Tx` does not hold its own connection or lock, so it
    /// groups a sequence of calls for callers but does not make them
    /// all-or-nothing. `commit`/`rollback` are no-ops for every driver.
    pub async fn begin_tx(&self) -> CoreResult<Box<dyn Tx>> {
        Ok(match &self.driver {
            Driver::Memory(e) => Box::new(MemoryTx::new(e.clone())),
            Driver::Relational(e) => Box::new(RelationalTx::new(e.clone())),
            Driver::Kv(e) => Box::new(KvTx::new(e.clone())),
        })
    }

    /// Run a sequence of repo calls against one `Tx`. This is sequencing
    /// sugar, not a real transaction: each call inside `f` commits itself
    /// as it runs, so a failure partway through `f` does not undo the
    /// calls that already succeeded. `commit`/`rollback` below are no-ops.
    /// Callers that need all-or-nothing behavior must compensate for
    /// partial failure themselves (see `Orchestrator::create_task`).
    pub async fn run_in_tx<T, F, Fut>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&dyn RepoBundle) -> Fut,
        Fut: std::future::Future<Output = CoreResult<T>>,
    {
        let tx = self.begin_tx().await?;
        match f(tx.as_ref()).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
