// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ctlplane_core::{CoreError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("acquire timed out waiting for a slot")]
    Timeout,
    #[error("circuit open for this workspace")]
    CircuitOpen,
    #[error("failed to spawn agent process: {0}")]
    SpawnFailed(String),
    #[error("agent process crashed: {0}")]
    ProcessCrashed(String),
    #[error("mount preparation failed: {0}")]
    Isolation(#[from] CoreError),
}

impl PoolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::Timeout => ErrorKind::Timeout,
            PoolError::CircuitOpen => ErrorKind::CircuitOpen,
            PoolError::SpawnFailed(_) => ErrorKind::SpawnFailed,
            PoolError::ProcessCrashed(_) => ErrorKind::ProcessCrashed,
            PoolError::Isolation(e) => e.kind,
        }
    }

    pub fn into_core_error(self) -> CoreError {
        let kind = self.kind();
        CoreError::new(kind, self.to_string())
    }
}
