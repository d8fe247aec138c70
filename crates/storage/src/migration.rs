// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned migration runner shared by every driver.
//!
//! Migrations are ordered by integer version and operate on a JSON
//! snapshot of persisted state. Each step runs inside the enclosing
//! transaction; a failing step leaves the recorded version unchanged.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("snapshot version {0} is newer than target version {1}")]
    TooNew(u32, u32),
    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),
    #[error("migration step failed: {0}")]
    StepFailed(String),
}

/// A single version-to-version transform over the persisted JSON snapshot.
pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, snapshot: &mut Value) -> Result<(), MigrationError>;
}

#[derive(Default)]
pub struct MigrationRegistry {
    pub(crate) migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { migrations: Vec::new() }
    }

    pub fn register(&mut self, migration: Box<dyn Migration>) {
        self.migrations.push(migration);
    }

    fn current_version(snapshot: &Value) -> u32 {
        snapshot.get("v").and_then(Value::as_u64).unwrap_or(0) as u32
    }

    /// Chain registered migrations from the snapshot's recorded version to
    /// `target`, applying each in turn. A no-op if already at `target`.
    pub fn migrate_to(&self, mut snapshot: Value, target: u32) -> Result<Value, MigrationError> {
        let mut current = Self::current_version(&snapshot);
        if current == target {
            return Ok(snapshot);
        }
        if current > target {
            return Err(MigrationError::TooNew(current, target));
        }
        while current < target {
            let step = self
                .migrations
                .iter()
                .find(|m| m.source_version() == current)
                .ok_or(MigrationError::NoPath(current, target))?;
            step.migrate(&mut snapshot)?;
            current = step.target_version();
            if let Some(obj) = snapshot.as_object_mut() {
                obj.insert("v".to_string(), Value::from(current));
            }
        }
        Ok(snapshot)
    }

    pub fn status(&self, snapshot: &Value) -> u32 {
        Self::current_version(snapshot)
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
